//! In-process hub wired to scripted drivers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    IngestionConfig, PlcSnapshot, ServerConfig, SourceId, SourceSnapshot, SpuSnapshot,
};
use dispatcher::{Acceptor, AcceptorStats, Aggregator, SessionRegistry};
use ingestion::{IngestionPipeline, LoopConfig, ScriptHandle, ScriptedDriver, SnapshotStore};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Server settings suited to loopback tests
pub fn test_server_config() -> ServerConfig {
    ServerConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        negotiation_timeout_ms: 500,
        write_timeout_ms: 500,
        shutdown_grace_ms: 500,
        ..ServerConfig::default()
    }
}

/// Ingestion settings with short retry delays
pub fn test_ingestion_config() -> IngestionConfig {
    IngestionConfig {
        backoff_initial_ms: 5,
        backoff_max_ms: 20,
        ..IngestionConfig::default()
    }
}

/// SPU reading carrying recognisable neutron and temperature values
pub fn spu(n_data: f32, t_data: f32) -> SourceSnapshot {
    SourceSnapshot::Spu(SpuSnapshot {
        read: 1,
        n_data,
        t_data,
        rdy: true,
        ..SpuSnapshot::default()
    })
}

/// PLC reading with a recognisable regulating rod position
pub fn plc(barra_reg: f32) -> SourceSnapshot {
    SourceSnapshot::Plc(PlcSnapshot {
        state: 3,
        barra_reg,
        ..PlcSnapshot::default()
    })
}

/// Running hub: scripted sources, snapshot store, acceptor
pub struct TestHub {
    pub addr: SocketAddr,
    pub store: Arc<SnapshotStore>,
    pub registry: SessionRegistry,
    handles: Vec<ScriptHandle>,
    ingestion: IngestionPipeline,
    token: CancellationToken,
    acceptor: JoinHandle<AcceptorStats>,
}

impl TestHub {
    pub async fn start() -> Self {
        Self::start_with(test_server_config()).await
    }

    pub async fn start_with(server: ServerConfig) -> Self {
        let ingestion_config = test_ingestion_config();
        let store = Arc::new(SnapshotStore::new());
        let aggregator = Aggregator::new(store.clone(), ingestion_config.stale_after());
        let acceptor = Acceptor::bind(&server, aggregator).await.unwrap();
        let addr = acceptor.local_addr().unwrap();
        let registry = acceptor.registry();

        let mut ingestion =
            IngestionPipeline::new(store.clone(), LoopConfig::from_config(&ingestion_config));
        let mut handles = Vec::new();
        for source in SourceId::ALL {
            let (driver, handle) = ScriptedDriver::new(source);
            ingestion.register_driver(Box::new(driver)).unwrap();
            handles.push(handle);
        }

        let token = CancellationToken::new();
        ingestion.start_all(token.child_token()).unwrap();
        let acceptor = tokio::spawn(acceptor.run(token.child_token()));

        Self {
            addr,
            store,
            registry,
            handles,
            ingestion,
            token,
            acceptor,
        }
    }

    /// Script handle of one source
    pub fn source(&self, source: SourceId) -> &ScriptHandle {
        &self.handles[source.index()]
    }

    /// Queue a reading and wait until the store has published it
    pub async fn publish(&self, source: SourceId, snapshot: SourceSnapshot) {
        let before = self.store.sequence(source);
        self.source(source).push_ok(snapshot);
        self.wait_for_sequence(source, before + 1).await;
    }

    /// Publish one default-shaped reading for every source
    pub async fn publish_all(&self) {
        self.publish(SourceId::SpuChA, spu(1.0, 20.0)).await;
        self.publish(SourceId::SpuChB, spu(2.0, 21.0)).await;
        self.publish(SourceId::Plc, plc(50.0)).await;
    }

    async fn wait_for_sequence(&self, source: SourceId, sequence: u64) {
        let mut updates = self.store.subscribe(source);
        tokio::time::timeout(
            Duration::from_secs(2),
            updates.wait_for(|slot| slot.as_ref().is_some_and(|p| p.sequence >= sequence)),
        )
        .await
        .expect("snapshot was not published in time")
        .unwrap();
    }

    /// Cancel everything and return the acceptor counters
    pub async fn shutdown(self) -> AcceptorStats {
        self.token.cancel();
        let stats = self.acceptor.await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), self.ingestion.join())
            .await
            .expect("source loops did not stop");
        stats
    }
}

/// Connect and send a negotiation line
pub async fn subscribe(addr: SocketAddr, request: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    stream
}

/// Read one text frame (ends with a closing brace on its own line)
pub async fn read_text_frame(stream: &mut TcpStream) -> String {
    let mut frame = Vec::new();
    let mut byte = [0u8; 1];
    while !frame.ends_with(b"\n}\n") {
        stream.read_exact(&mut byte).await.unwrap();
        frame.push(byte[0]);
    }
    String::from_utf8(frame).unwrap()
}

/// Read one fixed-size binary frame
pub async fn read_binary_frame(stream: &mut TcpStream) -> Vec<u8> {
    let mut frame = vec![0u8; dispatcher::FRAME_LEN];
    stream.read_exact(&mut frame).await.unwrap();
    frame
}

/// Poll `check` until it holds or three seconds pass
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..300 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
