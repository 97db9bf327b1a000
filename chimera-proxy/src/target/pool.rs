use std::sync::Arc;

use parking_lot::Mutex;

use super::{Target, TargetFactory, TargetSource};
use crate::error::{AopError, AopResult};
use crate::method::TypeDescriptor;

struct PoolState {
    idle: Vec<Arc<dyn Target>>,
    active: Vec<Arc<dyn Target>>,
    /// 已占用名额、正在创建的对象数
    creating: usize,
}

impl PoolState {
    fn in_use(&self) -> usize {
        self.active.len() + self.creating
    }
}

/// 有界对象池目标源
///
/// 每次调用借出一个对象，调用结束后归还。池满且没有空闲对象时，
/// `get_target` 直接失败而不是等待。
pub struct PoolingTargetSource {
    factory: TargetFactory,
    target_class: Option<TypeDescriptor>,
    max_size: usize,
    state: Mutex<PoolState>,
}

impl PoolingTargetSource {
    pub fn new<F>(target_class: Option<TypeDescriptor>, max_size: usize, factory: F) -> AopResult<Self>
    where
        F: Fn() -> AopResult<Arc<dyn Target>> + Send + Sync + 'static,
    {
        if max_size == 0 {
            return Err(AopError::configuration("pool max_size must be at least 1"));
        }

        Ok(Self {
            factory: Arc::new(factory),
            target_class,
            max_size,
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                active: Vec::new(),
                creating: 0,
            }),
        })
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// 当前借出的对象数
    pub fn active_count(&self) -> usize {
        self.state.lock().active.len()
    }

    /// 当前空闲的对象数
    pub fn idle_count(&self) -> usize {
        self.state.lock().idle.len()
    }
}

impl TargetSource for PoolingTargetSource {
    fn target_class(&self) -> Option<TypeDescriptor> {
        self.target_class
    }

    fn is_static(&self) -> bool {
        false
    }

    fn get_target(&self) -> AopResult<Arc<dyn Target>> {
        let mut state = self.state.lock();

        if let Some(target) = state.idle.pop() {
            state.active.push(target.clone());
            tracing::trace!(active = state.active.len(), idle = state.idle.len(), "Borrowed pooled target");
            return Ok(target);
        }

        if state.in_use() >= self.max_size {
            tracing::warn!(
                max_size = self.max_size,
                active = state.active.len(),
                creating = state.creating,
                "Target pool exhausted"
            );
            return Err(AopError::resolution(
                self.name(),
                format!("pool exhausted ({} of {} in use)", state.in_use(), self.max_size),
            ));
        }

        // 先占名额，创建对象时不持有锁
        state.creating += 1;
        drop(state);

        let created = (self.factory)();

        let mut state = self.state.lock();
        state.creating -= 1;
        let target = created?;
        state.active.push(target.clone());
        tracing::trace!(active = state.active.len(), idle = state.idle.len(), "Created pooled target");
        Ok(target)
    }

    fn release_target(&self, target: Arc<dyn Target>) -> AopResult<()> {
        let mut state = self.state.lock();

        let position = state
            .active
            .iter()
            .position(|borrowed| Arc::ptr_eq(borrowed, &target))
            .ok_or_else(|| AopError::release(self.name(), "object was not borrowed from this pool"))?;

        let target = state.active.swap_remove(position);
        state.idle.push(target);
        tracing::trace!(active = state.active.len(), idle = state.idle.len(), "Returned pooled target");
        Ok(())
    }

    fn name(&self) -> &str {
        "PoolingTargetSource"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::BankAccount;
    use once_cell::sync::OnceCell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Weak;

    fn pool(max_size: usize) -> PoolingTargetSource {
        PoolingTargetSource::new(Some(crate::testing::BANK_ACCOUNT), max_size, || {
            Ok(Arc::new(BankAccount::new(100)) as Arc<dyn Target>)
        })
        .unwrap()
    }

    #[test]
    fn test_zero_sized_pool_is_rejected() {
        let result = PoolingTargetSource::new(None, 0, || {
            Ok(Arc::new(BankAccount::new(0)) as Arc<dyn Target>)
        });
        assert!(matches!(result, Err(AopError::Configuration(_))));
    }

    #[test]
    fn test_borrow_and_return() {
        let pool = pool(2);
        let first = pool.get_target().unwrap();
        let second = pool.get_target().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(pool.active_count(), 2);

        let exhausted = pool.get_target();
        assert!(exhausted.is_err_and(|e| e.is_resolution()));

        pool.release_target(first.clone()).unwrap();
        assert_eq!(pool.active_count(), 1);
        assert_eq!(pool.idle_count(), 1);

        // 空闲对象被复用
        let again = pool.get_target().unwrap();
        assert!(Arc::ptr_eq(&again, &first));
    }

    #[test]
    fn test_release_of_foreign_object_fails() {
        let pool = pool(1);
        let stranger: Arc<dyn Target> = Arc::new(BankAccount::new(1));

        let err = pool.release_target(stranger).unwrap_err();
        assert!(err.is_release());
    }

    #[test]
    fn test_factory_runs_outside_the_pool_lock() {
        let pool_ref: Arc<OnceCell<Weak<PoolingTargetSource>>> = Arc::new(OnceCell::new());
        let nested = Arc::new(Mutex::new(Vec::new()));

        let factory_pool = pool_ref.clone();
        let factory_nested = nested.clone();
        let pool = Arc::new(
            PoolingTargetSource::new(None, 1, move || {
                // 创建期间再次访问池：不会死锁，占用的名额也已计入
                if let Some(pool) = factory_pool.get().and_then(Weak::upgrade) {
                    factory_nested
                        .lock()
                        .push((pool.idle_count(), pool.get_target().is_err()));
                }
                Ok(Arc::new(BankAccount::new(100)) as Arc<dyn Target>)
            })
            .unwrap(),
        );
        pool_ref.set(Arc::downgrade(&pool)).unwrap();

        pool.get_target().unwrap();
        assert_eq!(*nested.lock(), vec![(0, true)]);
        assert_eq!(pool.active_count(), 1);
    }

    #[test]
    fn test_failed_creation_frees_the_slot() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let pool = PoolingTargetSource::new(None, 1, move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(AopError::resolution("factory", "first attempt fails"));
            }
            Ok(Arc::new(BankAccount::new(100)) as Arc<dyn Target>)
        })
        .unwrap();

        assert!(pool.get_target().is_err());
        assert!(pool.get_target().is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_double_release_fails() {
        let pool = pool(1);
        let target = pool.get_target().unwrap();

        pool.release_target(target.clone()).unwrap();
        assert!(pool.release_target(target).is_err());
    }
}
