use async_trait::async_trait;

use palaver_core::Coordinates;

/// The device's position fix, behind whatever permission prompt the
/// platform puts in front of it. `None` means denied or unavailable; the
/// caller aborts silently in that case.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self) -> Option<Coordinates>;
}
