//! Provider-global fan-out tests

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio_test::{assert_err, assert_ok};

use provider_mux::backend::{BackendId, ProviderServer};
use provider_mux::mux::{FanOutMode, MuxOptions, MuxServer};
use provider_mux::protocol::{
    ConfigureProviderRequest, Diagnostic, StopProviderRequest, ValidateProviderConfigRequest, rpc,
};
use provider_mux::testing::TestServer;
use provider_mux::{Error, ErrorKind};

async fn mux(servers: &[Arc<TestServer>], options: MuxOptions) -> MuxServer {
    let backends = servers
        .iter()
        .map(|s| Arc::clone(s) as Arc<dyn ProviderServer>);
    MuxServer::with_options(backends, options).await.unwrap()
}

#[tokio::test]
async fn test_configure_provider_merges_in_ordinal_order() {
    let servers = vec![
        Arc::new(
            TestServer::new()
                .with_delay(Duration::from_millis(30))
                .with_configure_diagnostic(Diagnostic::error("first", "")),
        ),
        Arc::new(TestServer::new()),
        Arc::new(TestServer::new().with_configure_diagnostic(Diagnostic::error("third", ""))),
    ];
    let mux = mux(&servers, MuxOptions::default()).await;

    let resp = mux
        .configure_provider(ConfigureProviderRequest {
            engine_version: "1.9.0".to_string(),
            config: None,
        })
        .await
        .unwrap();

    // Error diagnostics are data, not failures
    assert_eq!(
        resp.diagnostics,
        vec![Diagnostic::error("first", ""), Diagnostic::error("third", "")]
    );
    assert!(servers.iter().all(|s| s.call_count(rpc::CONFIGURE_PROVIDER) == 1));
}

#[tokio::test]
async fn test_stop_provider_joins_errors() {
    let servers = vec![
        Arc::new(TestServer::new().with_stop_error("first stuck")),
        Arc::new(TestServer::new()),
        Arc::new(TestServer::new().with_stop_error("third stuck")),
    ];
    let mux = mux(&servers, MuxOptions::default()).await;

    let resp = assert_ok!(mux.stop_provider(StopProviderRequest::default()).await);

    assert_eq!(resp.error, "first stuck\nthird stuck");
}

#[tokio::test]
async fn test_stop_provider_clean() {
    let servers = vec![Arc::new(TestServer::new()), Arc::new(TestServer::new())];
    let mux = mux(&servers, MuxOptions::default()).await;

    let resp = assert_ok!(mux.stop_provider(StopProviderRequest::default()).await);

    assert!(resp.error.is_empty());
}

#[tokio::test]
async fn test_backend_call_failure_fails_fan_out() {
    for fan_out in [FanOutMode::Parallel, FanOutMode::Sequential] {
        let servers = vec![
            Arc::new(TestServer::new()),
            Arc::new(TestServer::new().with_failure(rpc::CONFIGURE_PROVIDER, "broken pipe")),
            Arc::new(TestServer::new()),
        ];
        let mux = mux(
            &servers,
            MuxOptions {
                fan_out,
                ..MuxOptions::default()
            },
        )
        .await;

        let err = assert_err!(
            mux.configure_provider(ConfigureProviderRequest::default())
                .await
        );

        assert_eq!(err.kind(), ErrorKind::FanOut);
        match err {
            Error::BackendCallFailed { rpc, backend, .. } => {
                assert_eq!(rpc, "ConfigureProvider");
                assert_eq!(backend, BackendId::new(1));
            }
            other => panic!("unexpected error: {other}"),
        }
        // Every backend was still invoked
        assert!(servers.iter().all(|s| s.called(rpc::CONFIGURE_PROVIDER)));
    }
}

#[tokio::test]
async fn test_cancelled_token_aborts_fan_out() {
    let hang = Duration::from_secs(3600);
    let servers = vec![
        Arc::new(TestServer::new().with_delay_on(rpc::VALIDATE_PROVIDER_CONFIG, hang)),
        Arc::new(TestServer::new().with_delay_on(rpc::VALIDATE_PROVIDER_CONFIG, hang)),
    ];
    let options = MuxOptions::default();
    let token = options.cancellation.clone();
    let mux = mux(&servers, options).await;

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
    });

    let err = assert_err!(
        mux.validate_provider_config(ValidateProviderConfigRequest::default())
            .await
    );

    assert!(err.is_cancelled());
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(servers.iter().all(|s| s.called(rpc::VALIDATE_PROVIDER_CONFIG)));
}

#[tokio::test]
async fn test_backend_cancellation_is_not_a_partial_merge() {
    let servers = vec![
        Arc::new(TestServer::new().with_configure_diagnostic(Diagnostic::warning("w", ""))),
        Arc::new(TestServer::new().with_cancellation(rpc::CONFIGURE_PROVIDER)),
    ];
    let mux = mux(&servers, MuxOptions::default()).await;

    let err = assert_err!(
        mux.configure_provider(ConfigureProviderRequest::default())
            .await
    );

    assert!(matches!(err, Error::Cancelled));
}

#[tokio::test]
async fn test_dropping_call_abandons_backends() {
    let hang = Duration::from_secs(3600);
    let servers = vec![
        Arc::new(TestServer::new()),
        Arc::new(TestServer::new().with_delay_on(rpc::CONFIGURE_PROVIDER, hang)),
    ];
    let mux = mux(&servers, MuxOptions::default()).await;

    let result = tokio::time::timeout(
        Duration::from_millis(20),
        mux.configure_provider(ConfigureProviderRequest::default()),
    )
    .await;

    // The caller gave up; the hung backend future was dropped with the call
    assert!(result.is_err());
    assert!(servers.iter().all(|s| s.call_count(rpc::CONFIGURE_PROVIDER) == 1));
}

#[tokio::test]
async fn test_stop_provider_reaches_backends_after_shutdown() {
    let servers = vec![
        Arc::new(TestServer::new().with_stop_error("first stuck")),
        Arc::new(TestServer::new()),
    ];
    let options = MuxOptions::default();
    let token = options.cancellation.clone();
    let mux = mux(&servers, options).await;

    token.cancel();

    // Other fan-outs honour the shutdown
    let err = assert_err!(
        mux.configure_provider(ConfigureProviderRequest::default())
            .await
    );
    assert!(err.is_cancelled());

    // Teardown still reaches every backend, every time
    for attempt in 1..=2 {
        let resp = assert_ok!(mux.stop_provider(StopProviderRequest::default()).await);
        assert_eq!(resp.error, "first stuck");
        assert!(servers.iter().all(|s| s.call_count(rpc::STOP_PROVIDER) == attempt));
    }
}

#[tokio::test]
async fn test_cancel_in_flight_leaves_mux_usable() {
    let hang = Duration::from_secs(3600);
    let servers = vec![
        Arc::new(TestServer::new().with_delay_on(rpc::VALIDATE_PROVIDER_CONFIG, hang)),
        Arc::new(TestServer::new()),
    ];
    let mux = Arc::new(mux(&servers, MuxOptions::default()).await);

    let canceller = Arc::clone(&mux);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        canceller.cancel_in_flight();
    });

    let err = assert_err!(
        mux.validate_provider_config(ValidateProviderConfigRequest::default())
            .await
    );
    assert!(err.is_cancelled());

    // Later calls run against a fresh token
    assert!(!mux.cancellation_token().is_cancelled());
    assert_ok!(
        mux.configure_provider(ConfigureProviderRequest::default())
            .await
    );
    assert!(servers.iter().all(|s| s.call_count(rpc::CONFIGURE_PROVIDER) == 1));
}

#[tokio::test]
async fn test_relayed_cancellation_aborts_mux_fan_out() {
    let servers = vec![
        Arc::new(TestServer::new()),
        Arc::new(TestServer::new().with_relayed_cancellation(rpc::CONFIGURE_PROVIDER)),
    ];
    let mux = mux(&servers, MuxOptions::default()).await;

    let err = assert_err!(
        mux.configure_provider(ConfigureProviderRequest::default())
            .await
    );

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}
