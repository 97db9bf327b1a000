use std::sync::Arc;

use super::{Target, TargetFactory, TargetSource};
use crate::error::AopResult;
use crate::method::TypeDescriptor;

/// 每次调用创建新对象的动态目标源
pub struct PrototypeTargetSource {
    factory: TargetFactory,
    target_class: Option<TypeDescriptor>,
}

impl PrototypeTargetSource {
    pub fn new<F>(target_class: Option<TypeDescriptor>, factory: F) -> Self
    where
        F: Fn() -> AopResult<Arc<dyn Target>> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
            target_class,
        }
    }
}

impl TargetSource for PrototypeTargetSource {
    fn target_class(&self) -> Option<TypeDescriptor> {
        self.target_class
    }

    fn is_static(&self) -> bool {
        false
    }

    fn get_target(&self) -> AopResult<Arc<dyn Target>> {
        let target = (self.factory)()?;
        tracing::trace!(target_type = target.type_descriptor().name, "Created prototype target");
        Ok(target)
    }

    fn release_target(&self, target: Arc<dyn Target>) -> AopResult<()> {
        tracing::trace!(target_type = target.type_descriptor().name, "Discarding prototype target");
        Ok(())
    }

    fn name(&self) -> &str {
        "PrototypeTargetSource"
    }
}
