use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::{Target, TargetFactory, TargetSource};
use crate::error::AopResult;
use crate::method::TypeDescriptor;

/// 首次调用时才创建目标对象的目标源
///
/// 创建之后总是返回同一个对象，因此是静态的。创建失败不会缓存，下一次调用会重试。
pub struct LazyInitTargetSource {
    factory: TargetFactory,
    declared_class: Option<TypeDescriptor>,
    target: OnceCell<Arc<dyn Target>>,
}

impl LazyInitTargetSource {
    pub fn new<F>(declared_class: Option<TypeDescriptor>, factory: F) -> Self
    where
        F: Fn() -> AopResult<Arc<dyn Target>> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
            declared_class,
            target: OnceCell::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.target.get().is_some()
    }
}

impl TargetSource for LazyInitTargetSource {
    fn target_class(&self) -> Option<TypeDescriptor> {
        self.declared_class
            .or_else(|| self.target.get().map(|target| target.type_descriptor()))
    }

    fn is_static(&self) -> bool {
        true
    }

    fn get_target(&self) -> AopResult<Arc<dyn Target>> {
        self.target
            .get_or_try_init(|| {
                tracing::debug!(declared = ?self.declared_class.map(|c| c.name), "Initializing lazy target");
                (self.factory)()
            })
            .cloned()
    }

    fn release_target(&self, _target: Arc<dyn Target>) -> AopResult<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "LazyInitTargetSource"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AopError;
    use crate::testing::{BankAccount, BANK_ACCOUNT};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_target_created_on_first_use_only() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = created.clone();
        let source = LazyInitTargetSource::new(None, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(BankAccount::new(5)) as Arc<dyn Target>)
        });

        assert!(!source.is_initialized());
        assert_eq!(source.target_class(), None);

        let first = source.get_target().unwrap();
        let second = source.get_target().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(source.target_class(), Some(BANK_ACCOUNT));
    }

    #[test]
    fn test_failed_initialization_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let source = LazyInitTargetSource::new(Some(BANK_ACCOUNT), move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(AopError::resolution("bank", "not ready"));
            }
            Ok(Arc::new(BankAccount::new(5)) as Arc<dyn Target>)
        });

        assert!(source.get_target().is_err());
        assert!(!source.is_initialized());
        assert!(source.get_target().is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
