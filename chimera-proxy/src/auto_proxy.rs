//! 自动代理
//!
//! 根据候选通知器判断目标对象是否需要代理，需要时返回包装后的代理。
//!
//! ## 工作原理
//!
//! 1. 收集候选通知器（显式注册的，以及通过 inventory 注册的）
//! 2. 对目标类型的候选方法逐个检查切点，筛出适用的通知器
//! 3. 有适用的通知器时按 `order()` 排序并创建代理，否则原样返回目标对象
//!
//! Rust 没有运行时反射，目标类型的候选方法需要调用方提供。

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::advisor::{get_all_advisor_registrations, sort_advisors, Advisor};
use crate::config::ProxyConfig;
use crate::error::AopResult;
use crate::method::{Method, TypeDescriptor};
use crate::pointcut::can_apply;
use crate::proxy::{create_proxy, AopProxy};
use crate::settings::ProxySettings;
use crate::target::{SingletonTargetSource, Target};

/// 通过 inventory 注册的通知器
///
/// 首次访问时创建，之后所有自动代理共享同一批实例
static REGISTERED_ADVISORS: Lazy<Vec<Arc<dyn Advisor>>> = Lazy::new(|| {
    get_all_advisor_registrations()
        .map(|registration| {
            tracing::debug!("Loading registered advisor: {}", registration.name);
            registration.create_instance()
        })
        .collect()
});

/// 获取所有通过 inventory 注册的通知器
pub fn registered_advisors() -> &'static [Arc<dyn Advisor>] {
    &REGISTERED_ADVISORS
}

/// 自动代理创建器
pub struct AutoProxyCreator {
    enabled: bool,
    advisors: Vec<Arc<dyn Advisor>>,
    settings: ProxySettings,
}

impl AutoProxyCreator {
    pub fn new() -> Self {
        Self {
            enabled: true,
            advisors: Vec::new(),
            settings: ProxySettings::default(),
        }
    }

    /// 不创建任何代理
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }

    /// 以所有通过 inventory 注册的通知器为候选
    pub fn from_registry() -> Self {
        let mut creator = Self::new();
        creator.register_all(registered_advisors().iter().cloned());
        creator
    }

    pub fn with_settings(mut self, settings: ProxySettings) -> Self {
        self.settings = settings;
        self
    }

    /// 注册候选通知器
    pub fn register(&mut self, advisor: Arc<dyn Advisor>) {
        tracing::debug!("Registering advisor: {}", advisor.name());
        self.advisors.push(advisor);
    }

    pub fn register_all(&mut self, advisors: impl IntoIterator<Item = Arc<dyn Advisor>>) {
        for advisor in advisors {
            self.register(advisor);
        }
    }

    pub fn advisors(&self) -> &[Arc<dyn Advisor>] {
        &self.advisors
    }

    /// 能作用于目标类型任一候选方法的通知器，已按 `order()` 排序
    pub fn find_eligible_advisors(
        &self,
        target_class: &TypeDescriptor,
        methods: &[Method],
    ) -> Vec<Arc<dyn Advisor>> {
        let mut eligible: Vec<Arc<dyn Advisor>> = self
            .advisors
            .iter()
            .filter(|advisor| match advisor.pointcut() {
                Some(pointcut) => can_apply(pointcut.as_ref(), target_class, methods),
                None => true,
            })
            .cloned()
            .collect();
        sort_advisors(&mut eligible);
        eligible
    }

    /// 需要时为目标对象创建代理
    pub fn wrap_if_necessary(
        &self,
        target: Arc<dyn Target>,
        methods: &[Method],
    ) -> AopResult<Arc<dyn Target>> {
        match self.create_proxy_for(&target, methods)? {
            Some(proxy) => Ok(Arc::new(proxy)),
            None => Ok(target),
        }
    }

    /// 为目标对象创建代理，没有适用的通知器时返回 None
    pub fn create_proxy_for(
        &self,
        target: &Arc<dyn Target>,
        methods: &[Method],
    ) -> AopResult<Option<AopProxy>> {
        let class = target.type_descriptor();
        if !self.enabled {
            return Ok(None);
        }

        let eligible = self.find_eligible_advisors(&class, methods);
        if eligible.is_empty() {
            tracing::trace!("Target '{}' does not match any advisor, skipping proxy creation", class);
            return Ok(None);
        }

        tracing::info!(
            "🔷 [AutoProxy] Creating proxy for '{}' with {} advisors",
            class,
            eligible.len()
        );

        let mut config = ProxyConfig::with_target_source(Arc::new(SingletonTargetSource::new(target.clone())));
        config.add_interfaces_of(&class);
        for advisor in eligible {
            config.add_advisor(advisor)?;
        }
        // 冻结标志最后设置，否则上面的 add_advisor 会被拒绝
        self.settings.apply(&mut config);

        create_proxy(config).map(Some)
    }
}

impl Default for AutoProxyCreator {
    fn default() -> Self {
        Self::new()
    }
}
