use std::sync::Arc;

use arc_swap::ArcSwap;

use super::{Target, TargetSource};
use crate::error::AopResult;
use crate::method::TypeDescriptor;

/// 可在运行时替换目标对象的目标源
///
/// 读取无锁；替换后，已经取得旧对象的调用继续使用旧对象直到结束
pub struct HotSwappableTargetSource {
    target: ArcSwap<Arc<dyn Target>>,
}

impl HotSwappableTargetSource {
    pub fn new(initial: Arc<dyn Target>) -> Self {
        Self {
            target: ArcSwap::from_pointee(initial),
        }
    }

    /// 替换目标对象，返回旧对象
    pub fn swap(&self, new_target: Arc<dyn Target>) -> Arc<dyn Target> {
        let new_type = new_target.type_descriptor().name;
        let old = self.target.swap(Arc::new(new_target));
        tracing::debug!(
            old_type = old.type_descriptor().name,
            new_type,
            "Hot-swapped target"
        );
        Arc::clone(&*old)
    }

    pub fn current(&self) -> Arc<dyn Target> {
        let guard = self.target.load();
        Arc::clone(&**guard)
    }
}

impl TargetSource for HotSwappableTargetSource {
    fn target_class(&self) -> Option<TypeDescriptor> {
        Some(self.target.load().type_descriptor())
    }

    fn is_static(&self) -> bool {
        false
    }

    fn get_target(&self) -> AopResult<Arc<dyn Target>> {
        Ok(self.current())
    }

    fn release_target(&self, _target: Arc<dyn Target>) -> AopResult<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "HotSwappableTargetSource"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::ProxyFactory;
    use crate::testing::{BankAccount, BALANCE};

    #[tokio::test]
    async fn test_swap_is_visible_to_next_call() {
        let source = Arc::new(HotSwappableTargetSource::new(Arc::new(BankAccount::new(100))));
        let proxy = ProxyFactory::with_target_source(source.clone()).get_proxy().unwrap();

        let before = proxy.call(&BALANCE, crate::args![]).await.unwrap();
        assert_eq!(before.downcast::<u64>().unwrap(), 100);

        let replacement: Arc<dyn Target> = Arc::new(BankAccount::new(900));
        let old = source.swap(replacement.clone());
        assert!(Arc::ptr_eq(&source.current(), &replacement));
        assert!(!Arc::ptr_eq(&old, &replacement));

        let after = proxy.call(&BALANCE, crate::args![]).await.unwrap();
        assert_eq!(after.downcast::<u64>().unwrap(), 900);
    }

    #[test]
    fn test_borrowed_target_survives_swap() {
        let source = HotSwappableTargetSource::new(Arc::new(BankAccount::new(1)));
        let borrowed = source.get_target().unwrap();
        source.swap(Arc::new(BankAccount::new(2)));

        assert!(!Arc::ptr_eq(&borrowed, &source.current()));
        source.release_target(borrowed).unwrap();
    }
}
