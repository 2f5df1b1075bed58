//! Integration tests for tether-core

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tether_core::*;

struct Echo {
    calls: AtomicUsize,
}

impl Echo {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Transport for Echo {
    async fn round_trip(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let body = request.body.collect().await?;
        Ok(HttpResponse::new(StatusCode::OK).with_body(body))
    }
}

/// Decorator that tags responses and relies on the restore guard.
struct Tagging {
    inner: Arc<dyn Transport>,
    handle: TransportHandle,
}

#[async_trait]
impl Transport for Tagging {
    async fn round_trip(&self, request: HttpRequest) -> Result<HttpResponse> {
        let _restore = self.handle.restore_guard();
        let res = self.inner.round_trip(request).await?;
        Ok(res.with_header("x-tagged", "1"))
    }
}

#[test]
fn test_child_delete_falls_through_to_parent() {
    let mut parent = Context::new();
    parent.set("token", "parent");
    let mut child = Context::new();
    child.use_parent(Arc::new(parent));

    for round in 0..3 {
        child.set("token", format!("child-{round}"));
        assert_eq!(child.get_string("token"), Some(format!("child-{round}")));
        child.delete("token");
        assert_eq!(child.get_string("token").as_deref(), Some("parent"));
    }
    assert_eq!(child.parent().and_then(|p| p.get_string("token")).as_deref(), Some("parent"));
}

#[test]
fn test_context_clone_isolation() {
    let mut original = Context::new();
    original.set("a", 1_i64);
    original.request.set_header("x-original", "yes").unwrap();

    let mut copy = original.clone();
    copy.set("a", 2_i64);
    copy.set("b", true);
    copy.request.set_header("x-copy", "yes").unwrap();
    original.set("c", "only original");

    assert_eq!(original.get_int("a"), Some(1));
    assert!(!original.contains("b"));
    assert!(original.request.header("x-copy").is_none());

    assert_eq!(copy.get_int("a"), Some(2));
    assert!(!copy.contains("c"));
    assert_eq!(copy.request.header("x-original"), Some("yes"));
}

#[test]
fn test_get_all_is_a_snapshot() {
    let mut parent = Context::new();
    parent.set("shared", "parent");
    parent.set("inherited", 1_i32);
    let mut ctx = Context::new();
    ctx.use_parent(Arc::new(parent));
    ctx.set("shared", "local");

    let snapshot = ctx.get_all();
    ctx.set("later", true);
    ctx.clear();

    assert_eq!(snapshot.len(), 2);
    let shared = snapshot.get(&Key::new("shared")).unwrap();
    assert_eq!(shared.downcast_ref::<&str>(), Some(&"local"));
    assert!(snapshot.contains_key(&Key::new("inherited")));
    assert!(!snapshot.contains_key(&Key::new("later")));

    // Clear is local only.
    assert_eq!(ctx.get_string("shared").as_deref(), Some("parent"));
}

#[test]
fn test_copy_to_is_one_way() {
    let mut parent = Context::new();
    parent.set("from_parent", true);
    let mut source = Context::new();
    source.use_parent(Arc::new(parent));
    source.set("local", 5_u8);

    let mut target = Context::new();
    source.copy_to(&mut target);
    source.set("local", 6_u8);
    target.set("target_only", true);

    assert_eq!(target.get_int("local"), Some(5));
    assert_eq!(target.get_bool("from_parent"), Some(true));
    assert!(target.parent().is_none());
    assert!(!source.contains("target_only"));
}

#[tokio::test]
async fn test_concurrent_requests_share_parent() {
    let transport = Echo::new();
    let mut client_ctx = Context::with_transport(transport.clone());
    client_ctx.set("client", "shared");
    let client_ctx = Arc::new(client_ctx);

    let mut client_mw = Middleware::new();
    client_mw.use_request(|ctx| {
        let id = ctx.get_int("id").unwrap_or(-1);
        ctx.set("seen_by_client", id);
        Control::Next
    });
    let client_mw = Arc::new(client_mw);

    let tasks: Vec<_> = (0..16_i64)
        .map(|id| {
            let parent = client_ctx.clone();
            let mw = Middleware::with_parent(client_mw.clone());
            tokio::spawn(async move {
                let mut ctx = Context::with_transport(parent.transport());
                ctx.use_parent(parent);
                ctx.set("id", id);
                ctx.request.body = Body::from(id.to_string());
                let res = dispatch(&mw, &mut ctx).await.unwrap();
                (id, ctx.get_int("seen_by_client"), res.text())
            })
        })
        .collect();

    for task in tasks {
        let (id, seen, body) = task.await.unwrap();
        assert_eq!(seen, Some(id));
        assert_eq!(body, id.to_string());
    }
    assert_eq!(transport.calls.load(Ordering::SeqCst), 16);
    assert!(!client_ctx.contains("id"));
    assert!(!client_ctx.contains("seen_by_client"));
}

#[tokio::test]
async fn test_decorator_installed_before_dial_is_restored() {
    let transport = Echo::new();
    let mut mw = Middleware::new();
    mw.use_handler(phase::BEFORE_DIAL, |ctx| {
        let handle = ctx.transport_handle().clone();
        ctx.transport_handle().decorate(|inner| {
            Arc::new(Tagging {
                inner,
                handle,
            })
        });
        Control::Next
    });

    let mut ctx = Context::with_transport(transport.clone());
    let res = dispatch(&mw, &mut ctx).await.unwrap();
    assert_eq!(res.header("x-tagged"), Some("1"));
    assert!(!ctx.transport_handle().is_decorated());

    // Dispatching again decorates once, not twice.
    ctx.response = None;
    let res = dispatch(&mw, &mut ctx).await.unwrap();
    assert_eq!(res.headers.get_all("x-tagged").iter().count(), 1);
    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_short_circuit_leaves_clones_undecorated() {
    let transport = Echo::new();
    let mut mw = Middleware::new();
    mw.use_handler(phase::BEFORE_DIAL, |ctx| {
        let handle = ctx.transport_handle().clone();
        ctx.transport_handle().decorate(|inner| Arc::new(Tagging { inner, handle }));
        if ctx.get_bool("cached") == Some(true) {
            ctx.set_response(HttpResponse::new(StatusCode::NOT_MODIFIED));
            return Control::Stop;
        }
        Control::Next
    });

    let mut original = Context::with_transport(transport.clone());
    original.set("cached", true);
    let res = dispatch(&mw, &mut original).await.unwrap();
    assert_eq!(res.status, StatusCode::NOT_MODIFIED);
    assert!(!original.transport_handle().is_decorated());

    // Decorate the original by hand; a clone must not carry it along.
    let handle = original.transport_handle().clone();
    original
        .transport_handle()
        .decorate(|inner| Arc::new(Tagging { inner, handle }));
    let mut copy = original.clone();
    assert!(!copy.transport_handle().is_decorated());

    copy.response = None;
    copy.set("cached", false);
    let res = dispatch(&mw, &mut copy).await.unwrap();
    assert_eq!(res.headers.get_all("x-tagged").iter().count(), 1);
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    assert!(original.transport_handle().is_decorated());
}

#[tokio::test]
async fn test_mux_gates_on_response_status() {
    let transport = Echo::new();
    let mut mux = Mux::when([matchers::phase(phase::RESPONSE), matchers::status(200)]);
    mux.use_response(|ctx| {
        if let Some(res) = ctx.response.as_mut() {
            res.status = StatusCode::ACCEPTED;
        }
        Control::Next
    });
    let mut mw = Middleware::new();
    mw.use_plugin(mux);

    let mut ctx = Context::with_transport(transport);
    let res = dispatch(&mw, &mut ctx).await.unwrap();
    assert_eq!(res.status, StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_custom_phase_run() {
    let mut mw = Middleware::new();
    mw.use_handler("audit", |ctx| {
        ctx.set("audited", true);
        Control::Next
    });
    let mut ctx = Context::new();
    assert_eq!(mw.run("audit", &mut ctx), Outcome::Completed);
    assert_eq!(ctx.phase().as_deref(), Some("audit"));
    assert_eq!(ctx.get_bool("audited"), Some(true));

    // The custom phase doesn't run as part of dispatch.
    let mut ctx = Context::new();
    let err = dispatch(&mw, &mut ctx).await.unwrap_err();
    assert!(matches!(err, Error::NoTransport));
    assert!(!ctx.contains("audited"));
}

#[test]
fn test_dispatch_without_transport_fails() {
    let mut middleware = Middleware::new();
    middleware.use_request(|ctx| {
        ctx.request.uri = Uri::from_static("http://example.com/");
        Control::Next
    });
    let mut ctx = Context::new();

    let err = tokio_test::block_on(dispatch(&middleware, &mut ctx)).unwrap_err();
    assert!(matches!(err, Error::NoTransport));
    assert!(ctx.has_error());
}
