//! HTTP listener tests over real sockets.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use graceful_shutdown::http::{ServeState, UNAVAILABLE_BODY};
use graceful_shutdown::lifecycle::channel;
use graceful_shutdown::{
    Coordinator, ExitStatus, HttpListener, Listener, ServerError, ShutdownOptions,
};

mod common;
use common::wait_until;

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

fn slow_listener(name: &str) -> HttpListener {
    HttpListener::new(name, "127.0.0.1:0")
        .handle("/", || async { "ok" })
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(300)).await;
                "slow done"
            }),
        )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rejects_new_requests_but_finishes_admitted_ones() {
    let listener = Arc::new(slow_listener("business"));
    let serving = {
        let listener = Arc::clone(&listener);
        tokio::spawn(async move { listener.start().await })
    };
    let addr = listener.wait_until_serving().await.expect("listener serving");
    let client = client();

    let response = client.get(format!("http://{addr}/")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "ok");

    let slow = {
        let client = client.clone();
        tokio::spawn(async move {
            let response = client.get(format!("http://{addr}/slow")).send().await?;
            let status = response.status();
            response.text().await.map(|body| (status, body))
        })
    };
    assert!(wait_until(Duration::from_secs(2), || listener.in_flight() == 1).await);

    listener.reject_requests();
    let rejected = client.get(format!("http://{addr}/")).send().await.unwrap();
    assert_eq!(rejected.status(), 503);
    assert_eq!(rejected.text().await.unwrap(), UNAVAILABLE_BODY);

    let (status, body) = slow.await.unwrap().unwrap();
    assert_eq!(status, 200);
    assert_eq!(body, "slow done");
    assert!(wait_until(Duration::from_secs(2), || listener.in_flight() == 0).await);

    listener.stop().await.unwrap();
    assert!(serving.await.unwrap().is_ok());
    assert_eq!(listener.state(), ServeState::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unknown_paths_rejected_while_shutting_down() {
    let listener = Arc::new(slow_listener("admin"));
    let serving = {
        let listener = Arc::clone(&listener);
        tokio::spawn(async move { listener.start().await })
    };
    let addr = listener.wait_until_serving().await.expect("listener serving");
    let client = client();

    let missing = client.get(format!("http://{addr}/missing")).send().await.unwrap();
    assert_eq!(missing.status(), 404);

    listener.reject_requests();
    let missing = client.get(format!("http://{addr}/missing")).send().await.unwrap();
    assert_eq!(missing.status(), 503);

    listener.stop().await.unwrap();
    assert!(serving.await.unwrap().is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_second_start_is_refused() {
    let listener = Arc::new(slow_listener("business"));
    let serving = {
        let listener = Arc::clone(&listener);
        tokio::spawn(async move { listener.start().await })
    };
    listener.wait_until_serving().await.expect("listener serving");

    let err = listener.start().await.unwrap_err();
    assert!(matches!(err, ServerError::AlreadyStarted { .. }));

    listener.stop().await.unwrap();
    assert!(serving.await.unwrap().is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bind_conflict_reported() {
    let first = Arc::new(slow_listener("business"));
    let serving = {
        let first = Arc::clone(&first);
        tokio::spawn(async move { first.start().await })
    };
    let addr = first.wait_until_serving().await.expect("listener serving");

    let second = HttpListener::new("admin", addr.to_string());
    let err = second.start().await.unwrap_err();
    match &err {
        ServerError::Bind { name, address, .. } => {
            assert_eq!(name, "admin");
            assert_eq!(address, &addr.to_string());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(second.state(), ServeState::Failed);
    assert!(second.wait_until_serving().await.is_none());
    assert!(matches!(
        second.stop().await,
        Err(ServerError::NotRunning { .. })
    ));

    first.stop().await.unwrap();
    assert!(serving.await.unwrap().is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_before_start_is_refused() {
    let listener = slow_listener("business");
    assert_eq!(listener.state(), ServeState::Idle);
    assert!(matches!(
        listener.stop().await,
        Err(ServerError::NotRunning { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_coordinated_shutdown_of_two_listeners() {
    let business = Arc::new(slow_listener("business"));
    let admin = Arc::new(
        HttpListener::new("admin", "127.0.0.1:0").handle("/", || async { "admin" }),
    );
    let options = ShutdownOptions {
        shutdown_timeout: Duration::from_secs(10),
        wait_time: Duration::from_secs(2),
        callback_timeout: Duration::from_secs(1),
        drain_poll_interval: Duration::from_millis(10),
    };
    let coordinator = Coordinator::new(
        vec![
            Arc::clone(&business) as Arc<dyn Listener>,
            Arc::clone(&admin) as Arc<dyn Listener>,
        ],
        options,
    )
    .unwrap();

    let (handle, source) = channel();
    let running = tokio::spawn(coordinator.run(source));

    let business_addr = business.wait_until_serving().await.expect("business serving");
    let admin_addr = admin.wait_until_serving().await.expect("admin serving");
    let client = client();
    let admin_reply = client
        .get(format!("http://{admin_addr}/"))
        .send()
        .await
        .unwrap();
    assert_eq!(admin_reply.text().await.unwrap(), "admin");

    let slow = {
        let client = client.clone();
        tokio::spawn(async move {
            let response = client
                .get(format!("http://{business_addr}/slow"))
                .send()
                .await?;
            response.text().await
        })
    };
    assert!(wait_until(Duration::from_secs(2), || business.in_flight() == 1).await);

    handle.graceful();
    let status = running.await.unwrap();

    assert_eq!(status, ExitStatus::Clean);
    assert_eq!(slow.await.unwrap().unwrap(), "slow done");
    assert_eq!(business.state(), ServeState::Stopped);
    assert_eq!(admin.state(), ServeState::Stopped);
    assert!(client
        .get(format!("http://{admin_addr}/"))
        .send()
        .await
        .is_err());
}
