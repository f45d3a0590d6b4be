//! Dispatcher behavior observed through a recording transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method, StatusCode};
use request_router::dispatch::{middleware_fn, Data, HandlerOptions, Incoming, RequestHandler};
use request_router::error::RegistrationError;

mod common;

fn handler_at(endpoint: &str) -> RequestHandler {
    RequestHandler::new(HandlerOptions {
        endpoint: endpoint.to_string(),
        ..HandlerOptions::default()
    })
    .unwrap()
}

#[test]
fn test_endpoint_must_be_well_formed() {
    for bad in ["api", "/api/"] {
        let options = HandlerOptions {
            endpoint: bad.to_string(),
            ..HandlerOptions::default()
        };
        assert!(RequestHandler::new(options).is_err(), "{} accepted", bad);
    }
    assert!(RequestHandler::new(HandlerOptions {
        endpoint: "/api".into(),
        ..HandlerOptions::default()
    })
    .is_ok());
}

#[tokio::test]
async fn test_path_parameters_and_query() {
    let mut handler = handler_at("/api");
    handler
        .get("/users/:id/posts/:post", vec![], |request, response, _data| async move {
            response.send(serde_json::json!({
                "id": request.path_parameters["id"],
                "post": request.path_parameters["post"],
                "sort": request.query_arguments.get("sort"),
            }));
            Ok(())
        })
        .unwrap();

    let recorded = common::dispatch(
        &handler,
        Incoming::new(Method::GET, "/api/users/7/posts/99?sort=desc"),
    )
    .await;

    assert_eq!(recorded.status, Some(StatusCode::OK));
    assert_eq!(recorded.header("content-type"), Some("application/json; charset=UTF-8"));
    let body: serde_json::Value = serde_json::from_slice(&recorded.body).unwrap();
    assert_eq!(body["id"], "7");
    assert_eq!(body["post"], "99");
    assert_eq!(body["sort"], "desc");
}

#[tokio::test]
async fn test_first_registered_route_wins() {
    let mut handler = handler_at("/");
    handler
        .get("/x/:a", vec![], |request, response, _data| async move {
            response.send(format!("first {}", request.path_parameters["a"]));
            Ok(())
        })
        .unwrap();
    handler
        .get("/x/:b", vec![], |_request, response, _data| async move {
            response.send("second");
            Ok(())
        })
        .unwrap();

    let recorded = common::dispatch(&handler, Incoming::new(Method::GET, "/x/1")).await;
    assert_eq!(recorded.body_text(), "first 1");
}

#[tokio::test]
async fn test_data_flows_through_middleware_chain() {
    let mut handler = handler_at("/");
    let a = middleware_fn(|_request, _response, _data, next| async move {
        next.resolve_with(Data::new().with("a", 1));
        Ok(())
    });
    let b = middleware_fn(|_request, _response, data, next| async move {
        let a = data.get("a").cloned().unwrap_or_default();
        next.resolve_with(Data::new().with("b", a));
        Ok(())
    });
    handler
        .get("/chain", vec![a, b], |_request, response, data| async move {
            response.send(data.get_as::<i64>("b").unwrap_or(-1));
            Ok(())
        })
        .unwrap();

    let recorded = common::dispatch(&handler, Incoming::new(Method::GET, "/chain")).await;
    assert_eq!(recorded.body_text(), "1");
}

#[tokio::test]
async fn test_reject_sets_status_and_skips_handler() {
    let called = Arc::new(AtomicUsize::new(0));
    let mut handler = handler_at("/");
    let teapot = middleware_fn(|_request, _response, _data, next| async move {
        next.reject_with(418);
        Ok(())
    });
    let seen = called.clone();
    handler
        .get("/tea", vec![teapot], move |_request, response, _data| {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                response.ok();
                Ok(())
            }
        })
        .unwrap();

    let recorded = common::dispatch(&handler, Incoming::new(Method::GET, "/tea")).await;
    assert_eq!(recorded.status, Some(StatusCode::IM_A_TEAPOT));
    assert_eq!(recorded.body_text(), "418");
    assert_eq!(called.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_reject_without_code_is_500() {
    let mut handler = handler_at("/");
    let deny = middleware_fn(|_request, _response, _data, next| async move {
        next.reject();
        Ok(())
    });
    handler
        .get("/deny", vec![deny], |_request, response, _data| async move {
            response.ok();
            Ok(())
        })
        .unwrap();

    let recorded = common::dispatch(&handler, Incoming::new(Method::GET, "/deny")).await;
    assert_eq!(recorded.status, Some(StatusCode::INTERNAL_SERVER_ERROR));
}

#[tokio::test]
async fn test_middleware_sending_stops_chain() {
    let later = Arc::new(AtomicUsize::new(0));
    let mut handler = handler_at("/");
    let early = middleware_fn(|_request, response, _data, _next| async move {
        response.send("early");
        Ok(())
    });
    let counter = later.clone();
    let never = middleware_fn(move |_request, _response, _data, next| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            next.resolve();
            Ok(())
        }
    });
    let counter = later.clone();
    handler
        .get("/early", vec![early, never], move |_request, response, _data| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                response.send("late");
                Ok(())
            }
        })
        .unwrap();

    let recorded = common::dispatch(&handler, Incoming::new(Method::GET, "/early")).await;
    assert_eq!(recorded.status, Some(StatusCode::OK));
    assert_eq!(recorded.body_text(), "early");
    assert_eq!(recorded.heads, 1);
    assert_eq!(later.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_settling_from_spawned_task() {
    let mut handler = handler_at("/");
    let deferred = middleware_fn(|_request, _response, _data, next| async move {
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            next.resolve_with(Data::new().with("late", true));
        });
        Ok(())
    });
    handler
        .get("/deferred", vec![deferred], |_request, response, data| async move {
            response.send(data.get_as::<bool>("late").unwrap_or(false));
            Ok(())
        })
        .unwrap();

    let recorded = common::dispatch(&handler, Incoming::new(Method::GET, "/deferred")).await;
    assert_eq!(recorded.body_text(), "true");
}

#[tokio::test]
async fn test_middleware_error_is_500() {
    let mut handler = handler_at("/");
    let failing = middleware_fn(|_request, _response, _data, _next| async move {
        Err("database unavailable".into())
    });
    handler
        .get("/fail", vec![failing], |_request, response, _data| async move {
            response.ok();
            Ok(())
        })
        .unwrap();

    let recorded = common::dispatch(&handler, Incoming::new(Method::GET, "/fail")).await;
    assert_eq!(recorded.status, Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert_eq!(recorded.body_text(), "Internal Server Error");
}

#[tokio::test]
async fn test_second_send_is_ignored() {
    let mut handler = handler_at("/");
    handler
        .get("/once", vec![], |_request, response, _data| async move {
            response.send("first");
            Ok(())
        })
        .unwrap();
    handler
        .get("/twice", vec![], |_request, response, _data| async move {
            assert!(response.send("first"));
            assert!(!response.send("second"));
            Ok(())
        })
        .unwrap();

    let once = common::dispatch(&handler, Incoming::new(Method::GET, "/once")).await;
    let twice = common::dispatch(&handler, Incoming::new(Method::GET, "/twice")).await;

    assert_eq!(twice.status, once.status);
    assert_eq!(twice.headers, once.headers);
    assert_eq!(twice.body, once.body);
    assert_eq!(twice.heads, 1);
    assert_eq!(twice.ends, 1);
}

#[tokio::test]
async fn test_duplicate_cookies_are_kept() {
    let mut handler = handler_at("/");
    handler
        .get("/cookies", vec![], |_request, response, _data| async move {
            response.set_cookie("a", "b");
            response.set_cookie("a", "b");
            response.ok();
            Ok(())
        })
        .unwrap();

    let recorded = common::dispatch(&handler, Incoming::new(Method::GET, "/cookies")).await;
    let cookies: Vec<_> = recorded.headers.get_all(header::SET_COOKIE).iter().collect();
    assert_eq!(cookies, vec!["a=b;", "a=b;"]);
}

#[tokio::test]
async fn test_request_view_headers_and_cookies() {
    let mut handler = handler_at("/");
    handler
        .get("/whoami", vec![], |request, response, _data| async move {
            let session = request.cookies.get("session").cloned().unwrap_or_default();
            let agent = request.header("User-Agent").unwrap_or_default().to_string();
            response.send(format!("{}|{}", session, agent));
            Ok(())
        })
        .unwrap();

    let incoming = Incoming::new(Method::GET, "/whoami")
        .with_header(header::COOKIE, HeaderValue::from_static("session=abc; theme=dark"))
        .with_header(header::USER_AGENT, HeaderValue::from_static("tests"));
    let recorded = common::dispatch(&handler, incoming).await;
    assert_eq!(recorded.body_text(), "abc|tests");
}

#[tokio::test]
async fn test_repeated_cookie_headers_parsed_separately() {
    let mut handler = handler_at("/");
    handler
        .get("/cookies", vec![], |request, response, _data| async move {
            let cookie = |name: &str| request.cookies.get(name).cloned().unwrap_or_default();
            response.send(format!("a=[{}] b=[{}] c=[{}]", cookie("a"), cookie("b"), cookie("c")));
            Ok(())
        })
        .unwrap();

    let incoming = Incoming::new(Method::GET, "/cookies")
        .with_header(header::COOKIE, HeaderValue::from_static("a=1"))
        .with_header(header::COOKIE, HeaderValue::from_static("b=2"));
    let recorded = common::dispatch(&handler, incoming).await;
    assert_eq!(recorded.body_text(), "a=[1] b=[2] c=[]");

    let incoming = Incoming::new(Method::GET, "/cookies")
        .with_header(header::COOKIE, HeaderValue::from_static("a=1; c=x"))
        .with_header(header::COOKIE, HeaderValue::from_static("a=3"));
    let recorded = common::dispatch(&handler, incoming).await;
    assert_eq!(recorded.body_text(), "a=[3] b=[] c=[x]");
}

#[tokio::test]
async fn test_static_folder_serves_file_bytes() {
    let mut handler = handler_at("/api");
    handler.mount_static_folder("/files", vec![], "tests/data").unwrap();

    let recorded = common::dispatch(&handler, Incoming::new(Method::GET, "/files/test.jpg")).await;
    assert_eq!(recorded.status, Some(StatusCode::OK));
    assert_eq!(recorded.header("content-type"), Some("image/jpeg"));
    assert_eq!(recorded.body, std::fs::read("tests/data/test.jpg").unwrap());
}

#[tokio::test]
async fn test_static_folder_index_and_missing_file() {
    let mut handler = handler_at("/api");
    handler.mount_static_folder("/files", vec![], "tests/data").unwrap();

    let index = common::dispatch(&handler, Incoming::new(Method::GET, "/files/")).await;
    assert_eq!(index.header("content-type"), Some("text/html"));
    assert!(index.body_text().contains("static index"));

    let missing = common::dispatch(&handler, Incoming::new(Method::GET, "/files/nope.png")).await;
    assert_eq!(missing.status, Some(StatusCode::NOT_FOUND));

    let escape = common::dispatch(&handler, Incoming::new(Method::GET, "/files/../Cargo.toml")).await;
    assert_eq!(escape.status, Some(StatusCode::NOT_FOUND));
}

#[tokio::test]
async fn test_static_file_runs_its_own_middleware() {
    let mut handler = handler_at("/api");
    handler.register_global_middleware(|_request, _response, _data, next| async move {
        next.reject_with(403);
        Ok(())
    });
    let tag = middleware_fn(|_request, response, _data, next| async move {
        response.set_header("X-Static", "yes");
        next.resolve();
        Ok(())
    });
    handler.mount_static_file("/logo.jpg", vec![tag], "tests/data/test.jpg").unwrap();

    let recorded = common::dispatch(&handler, Incoming::new(Method::GET, "/logo.jpg/?v=2")).await;
    assert_eq!(recorded.status, Some(StatusCode::OK));
    assert_eq!(recorded.header("x-static"), Some("yes"));
}

#[tokio::test]
async fn test_static_mount_colliding_with_endpoint_is_rejected() {
    let mut handler = handler_at("/api");
    let result = handler.mount_static_folder("/api/files", vec![], "tests/data");
    assert!(matches!(result, Err(RegistrationError::EndpointCollision { .. })));
    assert!(handler.routes().is_empty());
}

#[tokio::test]
async fn test_root_endpoint_falls_back_to_static() {
    let mut handler = handler_at("/");
    handler
        .get("/dynamic", vec![], |_request, response, _data| async move {
            response.send("dynamic");
            Ok(())
        })
        .unwrap();
    handler.mount_static_folder("/files", vec![], "tests/data").unwrap();

    let dynamic = common::dispatch(&handler, Incoming::new(Method::GET, "/dynamic")).await;
    assert_eq!(dynamic.body_text(), "dynamic");

    let file = common::dispatch(&handler, Incoming::new(Method::GET, "/files/test.jpg")).await;
    assert_eq!(file.header("content-type"), Some("image/jpeg"));

    let missing = common::dispatch(&handler, Incoming::new(Method::GET, "/other")).await;
    assert_eq!(missing.status, Some(StatusCode::NOT_FOUND));
}

#[tokio::test]
async fn test_missing_url_is_500() {
    let handler = handler_at("/");
    let incoming = Incoming {
        method: Some(Method::GET),
        ..Incoming::default()
    };
    let recorded = common::dispatch(&handler, incoming).await;
    assert_eq!(recorded.status, Some(StatusCode::INTERNAL_SERVER_ERROR));
}
