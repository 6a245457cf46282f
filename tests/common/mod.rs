#![allow(dead_code)]

use async_trait::async_trait;
use esox_connpool::{BoxError, Resource, ResourceFactory};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Connection handed out by [`CountingFactory`]
#[derive(Debug)]
pub struct TestConnection {
    pub id: usize,
    pub key: &'static str,
    pub transferable: bool,
    pub healthy: Arc<AtomicBool>,
    closed: Arc<AtomicUsize>,
    fail_close: bool,
}

impl Resource for TestConnection {
    fn mark_transferable(&mut self) {
        self.transferable = true;
    }

    fn is_valid(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    fn close(self) -> Result<(), BoxError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err("socket already reset".into());
        }
        Ok(())
    }
}

/// Factory that counts what it creates and what gets closed
#[derive(Clone, Default)]
pub struct CountingFactory {
    created: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    fail_close: Arc<AtomicBool>,
}

impl CountingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ResourceFactory for CountingFactory {
    type Key = &'static str;
    type Resource = TestConnection;

    async fn create(&self, key: &Self::Key) -> Result<TestConnection, BoxError> {
        let id = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(TestConnection {
            id,
            key: *key,
            transferable: false,
            healthy: Arc::new(AtomicBool::new(true)),
            closed: Arc::clone(&self.closed),
            fail_close: self.fail_close.load(Ordering::SeqCst),
        })
    }
}
