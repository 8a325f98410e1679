//! Paint fences between a host instance and a guest runtime.

use crate::integration::support::{test_session, Pair};
use futures::FutureExt;
use std::time::Duration;
use widget_bridge::sync::Theme;

#[tokio::test]
async fn test_fence_resolves_after_guest_frame() {
    let session = test_session();
    let pair = Pair::connect(&session, 1);

    session.store().set_theme(Theme::Dark);
    let mut wait = pair.instance.await_paint();
    assert!(!wait.is_immediate());

    pair.guest.pump();
    assert_eq!(pair.guest.context().unwrap().theme, Theme::Dark);
    assert!((&mut wait).now_or_never().is_none());

    assert_eq!(pair.guest.on_animation_frame(), 1);
    pair.instance.pump();
    tokio::time::timeout(Duration::from_secs(1), wait)
        .await
        .expect("fence resolved");
}

#[tokio::test]
async fn test_only_latest_fence_resolves() {
    let session = test_session();
    let pair = Pair::connect(&session, 1);

    let first = pair.instance.await_paint();
    let second = pair.instance.await_paint();
    pair.guest.pump();
    assert_eq!(pair.guest.on_animation_frame(), 2);
    pair.instance.pump();

    tokio::time::timeout(Duration::from_secs(1), second)
        .await
        .expect("second fence resolved");
    assert!(tokio::time::timeout(Duration::from_millis(50), first)
        .await
        .is_err());
}

#[tokio::test]
async fn test_fence_before_connect_is_immediate() {
    let session = test_session();
    let pair = Pair::mount(&session, 1);
    let wait = pair.instance.await_paint();
    assert!(wait.is_immediate());
    wait.await;
}

#[tokio::test]
async fn test_close_abandons_pending_fence() {
    let session = test_session();
    let pair = Pair::connect(&session, 1);
    let wait = pair.instance.await_paint();
    session.unmount(pair.instance.id());

    pair.guest.pump();
    pair.guest.on_animation_frame();
    assert!(tokio::time::timeout(Duration::from_millis(50), wait)
        .await
        .is_err());
}
