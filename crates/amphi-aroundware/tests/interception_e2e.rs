//! End-to-end interception tests.
//!
//! These tests drive the full callback chain the way a server would:
//! a request context armed with an upstream callback, an interceptor
//! splicing an aroundware between that callback and a downstream handler,
//! and the handler completing either on the current call stack or later
//! through the rewired async-completion slot.

use amphi_aroundware::{
    Aroundware, AroundwareFactory, FnAroundware, FnHandler, Interceptor, PreFailurePolicy,
};
use amphi_core::{CompletionSlot, Dispatch, ErrorSignal, Reply, RequestContext};
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode, Uri};
use parking_lot::Mutex;
use std::sync::Arc;

/// Records the order in which chain edges fire.
#[derive(Clone, Default)]
struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn push(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

/// Creates a context whose upstream callback records delivered replies.
fn make_ctx(delivered: &Arc<Mutex<Vec<Reply>>>) -> RequestContext {
    let delivered = delivered.clone();
    RequestContext::new(Method::GET, Uri::from_static("/orders/7"), HeaderMap::new())
        .with_upstream(move |reply: Reply| delivered.lock().push(reply))
}

/// An observing aroundware that logs both hook edges into a recorder.
fn recording_factory(recorder: Recorder) -> impl AroundwareFactory {
    move || {
        let pre_recorder = recorder.clone();
        let post_recorder = recorder.clone();
        Box::new(FnAroundware::new(
            move |_ctx: &mut RequestContext| {
                pre_recorder.push("pre");
                Ok(())
            },
            move |reply: Reply| {
                post_recorder.push("post");
                Ok(reply)
            },
        )) as Box<dyn Aroundware>
    }
}

#[test]
fn sync_completion_runs_the_whole_chain_before_process_returns() {
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let recorder = Recorder::default();
    let mut ctx = make_ctx(&delivered);

    let handler_recorder = recorder.clone();
    let interceptor = Interceptor::builder()
        .handler(FnHandler::new(move |_ctx| {
            handler_recorder.push("handler");
            Dispatch::Final(Reply::ok("ok"))
        }))
        .factory(recording_factory(recorder.clone()))
        .build();

    let dispatch = interceptor.process(&mut ctx);

    // The caller-visible result is never final; the real reply already
    // went out through the upstream callback.
    assert!(dispatch.is_pending());
    assert_eq!(recorder.events(), vec!["pre", "handler", "post"]);

    let delivered = delivered.lock();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].status(), StatusCode::OK);
    assert_eq!(&delivered[0].body()[..], b"ok");
}

#[test]
fn async_completion_delivers_through_the_rewired_slot() {
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let recorder = Recorder::default();
    let mut ctx = make_ctx(&delivered);

    // The handler stashes its slot handle the way a reactor continuation
    // would, and completes it after process() has long returned.
    let pending_slot: Arc<Mutex<Option<CompletionSlot>>> = Arc::new(Mutex::new(None));
    let handler_slot = pending_slot.clone();

    let interceptor = Interceptor::builder()
        .handler(FnHandler::new(move |ctx: &mut RequestContext| {
            *handler_slot.lock() = Some(ctx.completion().clone());
            Dispatch::Pending
        }))
        .factory(recording_factory(recorder.clone()))
        .build();

    assert!(interceptor.process(&mut ctx).is_pending());

    // Nothing may have been delivered before the slot fires.
    assert!(delivered.lock().is_empty());
    assert_eq!(recorder.events(), vec!["pre"]);

    let slot = pending_slot.lock().take().expect("handler captured the slot");
    slot.complete(Reply::text(StatusCode::NOT_FOUND, "missing"));

    assert_eq!(recorder.events(), vec!["pre", "post"]);
    let delivered = delivered.lock();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].status(), StatusCode::NOT_FOUND);
}

#[test]
fn post_process_transforms_the_reply_on_both_paths() {
    let stamping_factory = || {
        Box::new(FnAroundware::new(
            |_ctx: &mut RequestContext| Ok(()),
            |reply: Reply| {
                Ok(reply.with_header(
                    HeaderName::from_static("x-served-by"),
                    HeaderValue::from_static("amphi"),
                ))
            },
        )) as Box<dyn Aroundware>
    };

    // Synchronous path.
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let mut ctx = make_ctx(&delivered);
    Interceptor::builder()
        .handler(FnHandler::new(|_ctx| Dispatch::Final(Reply::ok("sync"))))
        .factory(stamping_factory)
        .build()
        .process(&mut ctx);
    assert_eq!(
        delivered.lock()[0].headers().get("x-served-by").unwrap(),
        "amphi"
    );

    // Asynchronous path.
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let mut ctx = make_ctx(&delivered);
    let pending_slot: Arc<Mutex<Option<CompletionSlot>>> = Arc::new(Mutex::new(None));
    let handler_slot = pending_slot.clone();
    Interceptor::builder()
        .handler(FnHandler::new(move |ctx: &mut RequestContext| {
            *handler_slot.lock() = Some(ctx.completion().clone());
            Dispatch::Pending
        }))
        .factory(stamping_factory)
        .build()
        .process(&mut ctx);

    pending_slot
        .lock()
        .take()
        .unwrap()
        .complete(Reply::ok("async"));
    assert_eq!(
        delivered.lock()[0].headers().get("x-served-by").unwrap(),
        "amphi"
    );
}

#[test]
fn pre_process_failure_short_circuits_by_default() {
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let mut ctx = make_ctx(&delivered);
    let handler_ran = Arc::new(Mutex::new(false));

    let handler_flag = handler_ran.clone();
    let interceptor = Interceptor::builder()
        .handler(FnHandler::new(move |_ctx| {
            *handler_flag.lock() = true;
            Dispatch::Final(Reply::ok("unreachable"))
        }))
        .factory(|| {
            Box::new(FnAroundware::new(
                |_ctx: &mut RequestContext| {
                    Err(ErrorSignal::unauthorized("token expired").with_header(
                        HeaderName::from_static("www-authenticate"),
                        HeaderValue::from_static("Bearer"),
                    ))
                },
                |reply: Reply| Ok(reply),
            )) as Box<dyn Aroundware>
        })
        .build();

    assert!(interceptor.process(&mut ctx).is_pending());
    assert!(!*handler_ran.lock(), "downstream handler must not run");

    let delivered = delivered.lock();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        delivered[0].headers().get("www-authenticate").unwrap(),
        "Bearer"
    );

    let body = String::from_utf8_lossy(delivered[0].body());
    assert!(body.contains("\"code\":\"UNAUTHORIZED\""));
    assert!(body.contains("token expired"));
}

#[test]
fn pre_process_failure_is_advisory_under_continue_policy() {
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let mut ctx = make_ctx(&delivered);

    let interceptor = Interceptor::builder()
        .handler(FnHandler::new(|_ctx| {
            Dispatch::Final(Reply::text(StatusCode::OK, "still served"))
        }))
        .factory(|| {
            Box::new(FnAroundware::new(
                |_ctx: &mut RequestContext| Err(ErrorSignal::unauthorized("advisory")),
                |reply: Reply| Ok(reply),
            )) as Box<dyn Aroundware>
        })
        .pre_failure_policy(PreFailurePolicy::ContinueDownstream)
        .build();

    interceptor.process(&mut ctx);

    let delivered = delivered.lock();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].status(), StatusCode::OK);
    assert_eq!(&delivered[0].body()[..], b"still served");
}

#[test]
fn double_completion_delivers_exactly_once() {
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let mut ctx = make_ctx(&delivered);
    let pending_slot: Arc<Mutex<Option<CompletionSlot>>> = Arc::new(Mutex::new(None));

    let handler_slot = pending_slot.clone();
    let interceptor = Interceptor::builder()
        .handler(FnHandler::new(move |ctx: &mut RequestContext| {
            *handler_slot.lock() = Some(ctx.completion().clone());
            Dispatch::Pending
        }))
        .build();

    interceptor.process(&mut ctx);

    let slot = pending_slot.lock().take().unwrap();
    slot.complete(Reply::text(StatusCode::OK, "first"));
    slot.complete(Reply::text(StatusCode::INTERNAL_SERVER_ERROR, "second"));

    let delivered = delivered.lock();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].status(), StatusCode::OK);
    assert_eq!(&delivered[0].body()[..], b"first");
}

#[test]
fn late_slot_completion_after_sync_finish_is_ignored() {
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let mut ctx = make_ctx(&delivered);

    let interceptor = Interceptor::builder()
        .handler(FnHandler::new(|_ctx| Dispatch::Final(Reply::ok("sync"))))
        .build();
    interceptor.process(&mut ctx);

    // A buggy continuation firing the slot anyway must not re-deliver.
    ctx.completion()
        .complete(Reply::text(StatusCode::BAD_GATEWAY, "stale"));

    let delivered = delivered.lock();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].status(), StatusCode::OK);
}

#[test]
fn post_process_error_signal_becomes_the_delivered_reply() {
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let mut ctx = make_ctx(&delivered);

    let interceptor = Interceptor::builder()
        .handler(FnHandler::new(|_ctx| Dispatch::Final(Reply::ok("fine"))))
        .factory(|| {
            Box::new(FnAroundware::new(
                |_ctx: &mut RequestContext| Ok(()),
                |_reply: Reply| Err(ErrorSignal::internal("post hook broke")),
            )) as Box<dyn Aroundware>
        })
        .build();

    interceptor.process(&mut ctx);

    let delivered = delivered.lock();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = String::from_utf8_lossy(delivered[0].body());
    assert!(body.contains("\"code\":\"INTERNAL_ERROR\""));
}

#[test]
fn each_request_gets_a_fresh_aroundware_instance() {
    let builds = Arc::new(Mutex::new(0_u32));
    let delivered = Arc::new(Mutex::new(Vec::new()));

    let builds_clone = builds.clone();
    let interceptor = Interceptor::builder()
        .handler(FnHandler::new(|_ctx| Dispatch::Final(Reply::ok("ok"))))
        .factory(move || {
            *builds_clone.lock() += 1;
            Box::new(FnAroundware::new(
                |_ctx: &mut RequestContext| Ok(()),
                |reply: Reply| Ok(reply),
            )) as Box<dyn Aroundware>
        })
        .build();

    for _ in 0..3 {
        let mut ctx = make_ctx(&delivered);
        interceptor.process(&mut ctx);
    }

    assert_eq!(*builds.lock(), 3);
    assert_eq!(delivered.lock().len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn completion_from_a_spawned_task_delivers_once() {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let tx = Arc::new(Mutex::new(Some(tx)));

    let upstream_tx = tx.clone();
    let mut ctx = RequestContext::new(Method::GET, Uri::from_static("/slow"), HeaderMap::new())
        .with_upstream(move |reply: Reply| {
            if let Some(tx) = upstream_tx.lock().take() {
                tx.send(reply.status()).ok();
            }
        });

    let interceptor = Interceptor::builder()
        .handler(FnHandler::new(|ctx: &mut RequestContext| {
            let slot = ctx.completion().clone();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                slot.complete(Reply::text(StatusCode::OK, "eventually"));
            });
            Dispatch::Pending
        }))
        .build();

    assert!(interceptor.process(&mut ctx).is_pending());
    assert_eq!(rx.await.expect("reply delivered"), StatusCode::OK);
}
