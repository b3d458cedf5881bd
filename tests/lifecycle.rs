//! Graceful shutdown over real sockets.
//!
//! Verifies the full sequence from a programmatic trigger: in-flight
//! requests complete, the listener closes, resources close in reverse
//! registration order, and the serve task itself terminates.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::Request;
use axum::http::{Method, StatusCode};
use manifold::http::{response, RequestContext};
use manifold::{Route, Server};
use tokio::sync::Notify;

#[tokio::test]
async fn test_shutdown_completes_in_flight_then_closes_resources_in_reverse() {
    let server = Server::from_config(common::test_config()).unwrap();

    let entered = Arc::new(Notify::new());
    let handler_entered = Arc::clone(&entered);
    server
        .register(Route::new(
            Method::GET,
            "/slow",
            move |_req: Request, _ctx: RequestContext| {
                let entered = Arc::clone(&handler_entered);
                async move {
                    entered.notify_one();
                    tokio::time::sleep(Duration::from_millis(400)).await;
                    response::text(StatusCode::OK, "done")
                }
            },
        ))
        .unwrap();

    let coordinator = server.coordinator();
    let closed = Arc::new(Mutex::new(Vec::new()));
    for name in ["session-store", "search-index"] {
        let closed = Arc::clone(&closed);
        coordinator.register(name, move || async move {
            closed.lock().unwrap().push(name);
            Ok(())
        });
    }

    let (addr, task) = common::spawn_server(server).await;

    let client = common::client();
    let url = format!("http://{addr}/api/v1/slow");
    let in_flight = tokio::spawn(async move { client.get(url).send().await });

    // Shut down only once the slow request is inside its handler.
    entered.notified().await;
    coordinator.trigger();

    let res = in_flight
        .await
        .unwrap()
        .expect("in-flight request should complete during drain");
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "done");

    tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .expect("serve task should stop after the drain")
        .unwrap();

    // Registration order was store then index; closes run dependents-first.
    assert_eq!(
        *closed.lock().unwrap(),
        vec!["search-index", "session-store"]
    );

    let refused = common::client()
        .get(format!("http://{addr}/healthz"))
        .send()
        .await;
    assert!(refused.is_err(), "listener should be closed after shutdown");
}

#[tokio::test]
async fn test_trigger_stops_idle_server() {
    let server = Server::from_config(common::test_config()).unwrap();
    let coordinator = server.coordinator();
    let (addr, task) = common::spawn_server(server).await;

    // Prove the listener was up at all before stopping it.
    let res = common::client()
        .get(format!("http://{addr}/healthz"))
        .send()
        .await
        .expect("liveness request failed");
    assert_eq!(res.status(), StatusCode::OK);

    coordinator.trigger();
    tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .expect("serve task should stop promptly with no traffic")
        .unwrap();

    let refused = common::client()
        .get(format!("http://{addr}/healthz"))
        .send()
        .await;
    assert!(refused.is_err(), "listener should be closed after shutdown");
}

#[tokio::test]
async fn test_callbacks_run_around_resource_closes() {
    let server = Server::from_config(common::test_config()).unwrap();
    let coordinator = server.coordinator();
    let order = Arc::new(Mutex::new(Vec::new()));

    {
        let order = Arc::clone(&order);
        coordinator.on_before_shutdown(move || async move {
            order.lock().unwrap().push("before");
        });
    }
    {
        let order = Arc::clone(&order);
        coordinator.register("resource", move || async move {
            order.lock().unwrap().push("resource");
            Ok(())
        });
    }
    {
        let order = Arc::clone(&order);
        coordinator.on_after_shutdown(move || async move {
            order.lock().unwrap().push("after");
        });
    }

    let (_addr, task) = common::spawn_server(server).await;
    coordinator.trigger();
    tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .expect("serve task should stop")
        .unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["before", "resource", "after"]);
}
