use crate::app::ports::ClockPort;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

pub struct SystemClock;

#[async_trait]
impl ClockPort for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
