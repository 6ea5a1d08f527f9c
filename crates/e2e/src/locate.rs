//! Locator resolution against the live page
//!
//! Resolution polls until the locator matches or its deadline passes.
//! Nested-frame locators search frames breadth-first from the top-level
//! document; a frame that has not reached `DOMContentLoaded` is skipped on
//! that pass and looked at again on the next one.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

use dashcheck_common::{FrameScope, LoadState, Locator};

use crate::driver::FrameInfo;
use crate::error::{E2eError, E2eResult};
use crate::session::Session;

/// Frames ordered breadth-first from the top-level document
pub fn breadth_first(frames: &[FrameInfo]) -> Vec<&FrameInfo> {
    let mut queue: VecDeque<&FrameInfo> = frames.iter().filter(|f| f.is_main()).collect();
    let mut ordered = Vec::with_capacity(frames.len());
    while let Some(frame) = queue.pop_front() {
        ordered.push(frame);
        queue.extend(
            frames
                .iter()
                .filter(|child| child.parent.as_deref() == Some(frame.id.as_str())),
        );
    }
    ordered
}

/// Poll `probe` every `interval` until it yields a value or `deadline` passes
///
/// The probe always runs at least once.
pub async fn poll_until<T, F, Fut>(deadline: Instant, interval: Duration, mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    loop {
        if let Some(value) = probe().await {
            return Some(value);
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

/// Find the frame holding the `nth` match of `locator`
///
/// Fails with `LocatorTimeout` once `timeout` elapses without a match.
pub async fn resolve(session: &Session, locator: &Locator, timeout: Duration) -> E2eResult<String> {
    let deadline = Instant::now() + timeout;
    let found = poll_until(deadline, session.poll_interval(), || async move {
        match find_once(session, locator).await {
            Ok(frame) => frame,
            Err(e) => {
                trace!(%locator, "resolution attempt failed: {e}");
                None
            }
        }
    })
    .await;

    match found {
        Some(frame) => {
            trace!(%locator, frame = %frame, "locator resolved");
            Ok(frame)
        }
        None => Err(E2eError::LocatorTimeout {
            locator: locator.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

async fn find_once(session: &Session, locator: &Locator) -> E2eResult<Option<String>> {
    let browser = session.browser();
    let frames = browser.frame_tree().await?;
    let ordered = breadth_first(&frames);

    if !locator.frame.is_nested() {
        let Some(main) = ordered.first() else {
            return Ok(None);
        };
        let count = browser.count(&main.id, locator).await?;
        return Ok((count > locator.nth).then(|| main.id.clone()));
    }

    for frame in ordered.iter().filter(|f| !f.is_main()) {
        if !admitted(&locator.frame, frame) {
            continue;
        }
        match browser.ready_state(&frame.id).await {
            Ok(state) if state >= LoadState::DomContentLoaded => {}
            Ok(state) => {
                debug!(frame = %frame.id, url = %frame.url, %state, "skipping frame that is not ready");
                continue;
            }
            Err(e) => {
                debug!(frame = %frame.id, url = %frame.url, "skipping unreachable frame: {e}");
                continue;
            }
        }
        match browser.count(&frame.id, locator).await {
            Ok(count) if count > locator.nth => return Ok(Some(frame.id.clone())),
            Ok(_) => {}
            Err(e) => debug!(frame = %frame.id, "frame query failed: {e}"),
        }
    }
    Ok(None)
}

fn admitted(scope: &FrameScope, frame: &FrameInfo) -> bool {
    scope.admits(&frame.url, frame.name.as_deref())
}

/// Wait until the top-level document reaches `state`
pub async fn wait_for_load_state(
    session: &Session,
    state: LoadState,
    timeout: Duration,
) -> Option<LoadState> {
    let deadline = Instant::now() + timeout;
    poll_until(deadline, session.poll_interval(), || async move {
        let current = main_frame_state(session).await?;
        (current >= state).then_some(current)
    })
    .await
}

async fn main_frame_state(session: &Session) -> Option<LoadState> {
    let browser = session.browser();
    let main = browser
        .frame_tree()
        .await
        .ok()?
        .into_iter()
        .find(|f| f.is_main())?;
    browser.ready_state(&main.id).await.ok()
}
