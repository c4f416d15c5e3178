use async_trait::async_trait;

/// One increment of opportunistic background work.
///
/// The controller calls [`perform`](BackgroundWork::perform) repeatedly while
/// admitted and checks for a fresh utilization sample after every call, so a
/// single increment should stay short.
#[async_trait]
pub trait BackgroundWork: Send {
    async fn perform(&mut self);
}

#[async_trait]
impl<F> BackgroundWork for F
where
    F: FnMut() + Send,
{
    async fn perform(&mut self) {
        self()
    }
}
