//! AMF daemon
//!
//! Main entry point: loads the configuration, opens the NGAP listener and
//! feeds transport events to one dispatch task per association until a
//! shutdown signal.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use amf_ngap::{JsonCodec, NgapCodec};
use amfd::config::{AmfConfig, DEFAULT_CONFIG_PATH};
use amfd::context::AmfContext;
use amfd::nas::LoggingNas;
use amfd::ngap_dispatch::{AssociationRouter, NgapDispatcher};
use amfd::ngap_handler::NgapHandler;
use amfd::ngap_path::{TcpTransport, TransportEvent};
use amfd::ngap_send::NgapSenderFactory;
use amfd::sbi_path::NullSmf;

/// Transport event queue depth
const EVENT_QUEUE_SIZE: usize = 1024;

/// AMF daemon - NGAP control plane
#[derive(Parser, Debug)]
#[command(name = "amfd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "5G Core AMF: NGAP control plane")]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// NGAP bind address, overrides the configuration (e.g., "0.0.0.0:38412")
    #[arg(long)]
    ngap_addr: Option<String>,

    /// Number of runtime worker threads, overrides the configuration
    #[arg(short, long)]
    workers: Option<usize>,
}

fn parse_log_level(level: &str) -> log::LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    }
}

/// AMF application state
pub struct AmfApp {
    running: Arc<AtomicBool>,
    config: AmfConfig,
}

impl AmfApp {
    pub fn new(config: AmfConfig) -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            config,
        }
    }

    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Serve NGAP until the running flag drops
    pub async fn run(&self) -> Result<()> {
        let ngap_addr: SocketAddr = self.config.ngap_addr.parse().map_err(|e| {
            anyhow::anyhow!("Invalid NGAP address '{}': {}", self.config.ngap_addr, e)
        })?;

        let amf = Arc::new(AmfContext::with_limits(
            self.config.operator.clone(),
            self.config.max_ran,
            self.config.max_ran_ue,
        ));
        let codec: Arc<dyn NgapCodec> = Arc::new(JsonCodec);
        let transport = TcpTransport::new();
        let senders = Arc::new(NgapSenderFactory::new(codec.clone(), transport.clone()));
        let handler = Arc::new(NgapHandler::new(
            amf,
            Arc::new(NullSmf),
            Arc::new(LoggingNas),
        ));
        let dispatcher = Arc::new(NgapDispatcher::new(handler, codec, senders));
        let mut associations = AssociationRouter::new(dispatcher);

        let listener = TcpListener::bind(ngap_addr).await?;
        let (event_tx, mut event_rx) = mpsc::channel::<TransportEvent>(EVENT_QUEUE_SIZE);
        let server = tokio::spawn(transport.serve(listener, event_tx));

        log::info!("AMF running...");
        let mut tick = tokio::time::interval(Duration::from_millis(100));

        while self.running.load(Ordering::SeqCst) {
            tokio::select! {
                event = event_rx.recv() => match event {
                    Some(event) => associations.route(event),
                    None => {
                        log::error!("NGAP server stopped");
                        break;
                    }
                },
                _ = tick.tick() => {}
            }
        }

        log::info!("Shutting down AMF...");
        server.abort();
        associations.shutdown().await;
        log::info!("AMF shutdown complete");
        Ok(())
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(parse_log_level(&args.log_level))
        .format_timestamp_millis()
        .init();

    log::info!("AMF v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Configuration: {}", args.config);

    let mut config = AmfConfig::load(&args.config)?;
    if let Some(addr) = args.ngap_addr {
        config.ngap_addr = addr;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers.max(1))
        .enable_all()
        .build()?;
    log::info!("Runtime started ({} workers)", config.workers.max(1));

    let app = AmfApp::new(config);

    let running = app.running_flag();
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    runtime.block_on(app.run())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["amfd"]).unwrap();
        assert_eq!(args.config, DEFAULT_CONFIG_PATH);
        assert_eq!(args.log_level, "info");
        assert!(args.ngap_addr.is_none());
        assert!(args.workers.is_none());
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::try_parse_from([
            "amfd",
            "-c",
            "/tmp/amf.yaml",
            "--ngap-addr",
            "127.0.0.1:38412",
            "-w",
            "2",
        ])
        .unwrap();
        assert_eq!(args.config, "/tmp/amf.yaml");
        assert_eq!(args.ngap_addr.as_deref(), Some("127.0.0.1:38412"));
        assert_eq!(args.workers, Some(2));
    }

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(parse_log_level("DEBUG"), log::LevelFilter::Debug);
        assert_eq!(parse_log_level("warn"), log::LevelFilter::Warn);
        assert_eq!(parse_log_level("bogus"), log::LevelFilter::Info);
    }

    #[test]
    fn test_amf_app_stop() {
        let app = AmfApp::new(AmfConfig::default());
        let flag = app.running_flag();
        assert!(flag.load(Ordering::SeqCst));
        app.stop();
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_run_rejects_bad_address() {
        let config = AmfConfig {
            ngap_addr: "not-an-address".to_string(),
            ..AmfConfig::default()
        };
        let app = AmfApp::new(config);
        assert!(app.run().await.is_err());
    }
}
