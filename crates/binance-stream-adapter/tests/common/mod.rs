/*
[INPUT]:  Scripted raw frames, transport failures and closes
[OUTPUT]: In-memory Connector plus payload fixtures shared by integration tests
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for binance-stream-adapter tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use binance_stream_adapter::ws::receiver_stream;
use binance_stream_adapter::{
    Connector, RawMessage, RawMessageStream, Result, StreamClient, StreamConfig, StreamError,
};
use tokio::sync::mpsc;
use url::Url;

const FEED_CAPACITY: usize = 256;

/// Sending side of one scripted connection.
#[derive(Clone)]
pub struct Feed {
    tx: mpsc::Sender<Result<RawMessage>>,
    sequence: Arc<AtomicU64>,
}

impl Feed {
    pub async fn text(&self, payload: &str) {
        self.bytes(payload.as_bytes().to_vec()).await;
    }

    pub async fn bytes(&self, payload: Vec<u8>) {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let _ = self.tx.send(Ok(RawMessage::new(sequence, payload))).await;
    }

    pub async fn fail(&self, cause: &str) {
        let _ = self.tx.send(Err(StreamError::transport(cause))).await;
    }

    /// Resolves once the consumer has dropped the stream.
    pub async fn released(&self) {
        self.tx.closed().await;
    }
}

#[derive(Default)]
struct Script {
    pending: VecDeque<mpsc::Receiver<Result<RawMessage>>>,
    // feeds created by `open` that no test has claimed yet
    unclaimed: Vec<Feed>,
    opened: Vec<Url>,
    fail_next_open: Option<String>,
}

/// Connector that serves prepared in-memory feeds instead of sockets.
///
/// `prepare()` queues a feed before subscribing so frames can be buffered
/// ahead of the dispatch loop; otherwise `open` creates one on demand and
/// `last_feed()` hands it out. The connector never keeps a claimed feed, so
/// dropping the test's copy closes the stream.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prepare(&self) -> Feed {
        let (feed, rx) = new_feed();
        self.script.lock().expect("script lock").pending.push_back(rx);
        feed
    }

    /// Claim the feed behind the most recent on-demand connection
    pub fn last_feed(&self) -> Feed {
        self.script
            .lock()
            .expect("script lock")
            .unclaimed
            .pop()
            .expect("no unclaimed connection")
    }

    pub fn opened(&self) -> Vec<Url> {
        self.script.lock().expect("script lock").opened.clone()
    }

    pub fn fail_next_open(&self, cause: &str) {
        self.script.lock().expect("script lock").fail_next_open = Some(cause.to_string());
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open(&self, endpoint: &Url) -> Result<RawMessageStream> {
        let mut script = self.script.lock().expect("script lock");
        if let Some(cause) = script.fail_next_open.take() {
            return Err(StreamError::transport(cause));
        }
        script.opened.push(endpoint.clone());
        let rx = match script.pending.pop_front() {
            Some(rx) => rx,
            None => {
                let (feed, rx) = new_feed();
                script.unclaimed.push(feed);
                rx
            }
        };
        Ok(receiver_stream(rx))
    }
}

fn new_feed() -> (Feed, mpsc::Receiver<Result<RawMessage>>) {
    let (tx, rx) = mpsc::channel(FEED_CAPACITY);
    let feed = Feed {
        tx,
        sequence: Arc::new(AtomicU64::new(0)),
    };
    (feed, rx)
}

pub fn scripted_client() -> (StreamClient<ScriptedConnector>, ScriptedConnector) {
    let connector = ScriptedConnector::new();
    let client = StreamClient::with_connector(StreamConfig::default(), connector.clone())
        .expect("default config is valid");
    (client, connector)
}

pub fn agg_trade(id: i64) -> String {
    format!(
        r#"{{"e":"aggTrade","E":123456789,"s":"BNBBTC","a":{id},"p":"0.001","q":"100","f":100,"l":105,"T":123456785,"m":true,"M":true}}"#
    )
}

pub fn depth_update(final_update_id: i64) -> String {
    format!(
        r#"{{"e":"depthUpdate","E":123456789,"s":"BNBBTC","U":157,"u":{final_update_id},"b":[["0.0024","10"]],"a":[["0.0026","100"]]}}"#
    )
}

pub const KLINE: &str = r#"{"e":"kline","E":123456789,"s":"BNBBTC","k":{"t":123400000,"T":123460000,"s":"BNBBTC","i":"1m","f":100,"L":200,"o":"0.0010","c":"0.0020","h":"0.0025","l":"0.0015","v":"1000","n":100,"x":false,"q":"1.0000","V":"500","Q":"0.500","B":"123456"}}"#;

pub const EXECUTION_REPORT: &str = r#"{"e":"executionReport","E":1499405658658,"s":"ETHBTC","c":"mUvoqJxFIILMdfAW5iGSOW","S":"BUY","o":"LIMIT","f":"GTC","q":"1.00000000","p":"0.10264410","P":"0.00000000","F":"0.00000000","g":-1,"C":"","x":"TRADE","X":"PARTIALLY_FILLED","r":"NONE","i":4293153,"l":"0.25000000","z":"0.25000000","L":"0.10264400","n":"0.00002566","N":"ETH","T":1499405658657,"t":7,"I":8641984,"w":true,"m":false,"M":false}"#;

pub const ACCOUNT_INFO: &str = r#"{"e":"outboundAccountInfo","E":1499405658849,"m":0,"t":0,"b":0,"s":0,"T":true,"W":true,"D":true,"u":1499405658848,"B":[{"a":"LTC","f":"17366.18538083","l":"0.00000000"},{"a":"BTC","f":"10537.85314051","l":"2.19464093"}]}"#;
