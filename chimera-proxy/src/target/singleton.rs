use std::fmt;
use std::sync::Arc;

use super::{Target, TargetSource};
use crate::error::AopResult;
use crate::method::TypeDescriptor;

/// 持有固定对象的静态目标源
#[derive(Clone)]
pub struct SingletonTargetSource {
    target: Arc<dyn Target>,
}

impl SingletonTargetSource {
    pub fn new(target: Arc<dyn Target>) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &Arc<dyn Target> {
        &self.target
    }
}

impl TargetSource for SingletonTargetSource {
    fn target_class(&self) -> Option<TypeDescriptor> {
        Some(self.target.type_descriptor())
    }

    fn is_static(&self) -> bool {
        true
    }

    fn get_target(&self) -> AopResult<Arc<dyn Target>> {
        Ok(self.target.clone())
    }

    fn release_target(&self, _target: Arc<dyn Target>) -> AopResult<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "SingletonTargetSource"
    }
}

impl fmt::Debug for SingletonTargetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingletonTargetSource")
            .field("target", &self.target.type_descriptor().name)
            .finish()
    }
}
