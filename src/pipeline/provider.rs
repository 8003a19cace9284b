use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};

use crate::{
    error::ProcessError,
    types::{Frame, HandPose},
};

pub trait LandmarkProvider: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Option<HandPose>>;
}

pub struct ProviderPool {
    idle_tx: Sender<Box<dyn LandmarkProvider>>,
    idle_rx: Receiver<Box<dyn LandmarkProvider>>,
    size: usize,
    checkout_timeout: Duration,
}

impl ProviderPool {
    pub fn new(providers: Vec<Box<dyn LandmarkProvider>>, checkout_timeout: Duration) -> Self {
        let size = providers.len();
        let (idle_tx, idle_rx) = bounded(size.max(1));
        for provider in providers {
            // Capacity equals the number of providers, so this never blocks.
            let _ = idle_tx.send(provider);
        }
        Self {
            idle_tx,
            idle_rx,
            size,
            checkout_timeout,
        }
    }

    pub fn single(provider: Box<dyn LandmarkProvider>, checkout_timeout: Duration) -> Self {
        Self::new(vec![provider], checkout_timeout)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn idle(&self) -> usize {
        self.idle_rx.len()
    }

    pub fn checkout(&self) -> Result<PooledProvider<'_>, ProcessError> {
        match self.idle_rx.recv_timeout(self.checkout_timeout) {
            Ok(provider) => Ok(PooledProvider {
                provider: Some(provider),
                pool: self,
            }),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                Err(ProcessError::ProviderBusy(self.checkout_timeout))
            }
        }
    }
}

pub struct PooledProvider<'a> {
    provider: Option<Box<dyn LandmarkProvider>>,
    pool: &'a ProviderPool,
}

impl LandmarkProvider for PooledProvider<'_> {
    fn detect(&mut self, frame: &Frame) -> Result<Option<HandPose>> {
        match self.provider.as_mut() {
            Some(provider) => provider.detect(frame),
            None => Ok(None),
        }
    }
}

impl Drop for PooledProvider<'_> {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if self.pool.idle_tx.try_send(provider).is_err() {
                log::error!("landmark provider could not be returned to the pool");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        thread,
    };

    use super::*;

    struct CountingProvider {
        calls: Arc<AtomicUsize>,
    }

    impl LandmarkProvider for CountingProvider {
        fn detect(&mut self, _frame: &Frame) -> Result<Option<HandPose>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    fn frame() -> Frame {
        Frame::new(vec![0; 4], 1, 1)
    }

    #[test]
    fn checkout_returns_provider_on_drop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pool = ProviderPool::single(
            Box::new(CountingProvider {
                calls: calls.clone(),
            }),
            Duration::from_millis(50),
        );
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.idle(), 1);

        {
            let mut provider = pool.checkout().unwrap();
            assert_eq!(pool.idle(), 0);
            assert!(provider.detect(&frame()).unwrap().is_none());
        }

        assert_eq!(pool.idle(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn exhausted_pool_times_out() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pool = ProviderPool::single(
            Box::new(CountingProvider { calls }),
            Duration::from_millis(20),
        );

        let _held = pool.checkout().unwrap();
        match pool.checkout() {
            Err(ProcessError::ProviderBusy(timeout)) => {
                assert_eq!(timeout, Duration::from_millis(20))
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("checkout should time out while the only provider is held"),
        }
    }

    #[test]
    fn empty_pool_reports_busy() {
        let pool = ProviderPool::new(Vec::new(), Duration::from_millis(5));
        assert_eq!(pool.size(), 0);
        assert!(matches!(pool.checkout(), Err(ProcessError::ProviderBusy(_))));
    }

    #[test]
    fn concurrent_requests_share_providers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let providers: Vec<Box<dyn LandmarkProvider>> = (0..2)
            .map(|_| {
                Box::new(CountingProvider {
                    calls: calls.clone(),
                }) as Box<dyn LandmarkProvider>
            })
            .collect();
        let pool = Arc::new(ProviderPool::new(providers, Duration::from_secs(5)));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                thread::spawn(move || {
                    let mut provider = pool.checkout().unwrap();
                    provider.detect(&frame()).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 8);
        assert_eq!(pool.idle(), 2);
    }
}
