//! 代理配置
//!
//! 配置分两个阶段：
//! - [`ProxyConfig`]：可变的构建阶段，调整通知器、目标源和策略标志
//! - [`AdvisedConfig`]：`freeze` 之后的只读阶段，由所有基于它创建的代理共享

use std::fmt;
use std::sync::Arc;

use crate::advice::Advice;
use crate::advisor::{sort_advisors, Advisor, DefaultAdvisor};
use crate::chain::{Chain, ChainFactory};
use crate::error::{AopError, AopResult};
use crate::method::{Method, TypeDescriptor, MANAGED_PROXY};
use crate::target::{SingletonTargetSource, Target, TargetSource};

/// 代理配置（构建阶段）
#[derive(Clone, Default)]
pub struct ProxyConfig {
    advisors: Vec<Arc<dyn Advisor>>,
    target_source: Option<Arc<dyn TargetSource>>,
    interfaces: Vec<TypeDescriptor>,
    proxy_target_class: bool,
    optimize: bool,
    frozen: bool,
    opaque: bool,
    expose_proxy: bool,
}

impl ProxyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以指定目标源开始配置
    pub fn with_target_source(target_source: Arc<dyn TargetSource>) -> Self {
        Self {
            target_source: Some(target_source),
            ..Self::default()
        }
    }

    fn check_not_frozen(&self, action: &'static str) -> AopResult<()> {
        if self.frozen {
            return Err(AopError::ConfigFrozen(action));
        }
        Ok(())
    }

    // ========== 通知器 ==========

    pub fn add_advisor(&mut self, advisor: Arc<dyn Advisor>) -> AopResult<()> {
        self.check_not_frozen("add advisor")?;
        tracing::trace!(advisor = advisor.name(), position = self.advisors.len(), "Adding advisor");
        self.advisors.push(advisor);
        Ok(())
    }

    /// 添加匹配所有方法的通知
    pub fn add_advice(&mut self, advice: Advice) -> AopResult<()> {
        self.add_advisor(Arc::new(DefaultAdvisor::new(advice)))
    }

    pub fn insert_advisor(&mut self, position: usize, advisor: Arc<dyn Advisor>) -> AopResult<()> {
        self.check_not_frozen("insert advisor")?;
        if position > self.advisors.len() {
            return Err(AopError::configuration(format!(
                "Illegal advisor position {}: only {} advisors configured",
                position,
                self.advisors.len()
            )));
        }
        self.advisors.insert(position, advisor);
        Ok(())
    }

    /// 按名称移除通知器，返回是否找到
    pub fn remove_advisor(&mut self, name: &str) -> AopResult<bool> {
        self.check_not_frozen("remove advisor")?;
        match self.advisors.iter().position(|advisor| advisor.name() == name) {
            Some(index) => {
                self.advisors.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// 按 `order()` 稳定排序
    pub fn sort_advisors(&mut self) -> AopResult<()> {
        self.check_not_frozen("sort advisors")?;
        sort_advisors(&mut self.advisors);
        Ok(())
    }

    pub fn advisors(&self) -> &[Arc<dyn Advisor>] {
        &self.advisors
    }

    // ========== 目标源 ==========

    /// 以单例目标源包装固定的目标对象
    pub fn set_target(&mut self, target: Arc<dyn Target>) -> AopResult<()> {
        self.set_target_source(Arc::new(SingletonTargetSource::new(target)))
    }

    pub fn set_target_source(&mut self, target_source: Arc<dyn TargetSource>) -> AopResult<()> {
        self.check_not_frozen("change target source")?;
        self.target_source = Some(target_source);
        Ok(())
    }

    pub fn target_source(&self) -> Option<&Arc<dyn TargetSource>> {
        self.target_source.as_ref()
    }

    pub fn target_class(&self) -> Option<TypeDescriptor> {
        self.target_source.as_ref().and_then(|source| source.target_class())
    }

    // ========== 接口 ==========

    /// 添加代理要暴露的接口，重复添加会被忽略
    pub fn add_interface(&mut self, interface: TypeDescriptor) -> AopResult<()> {
        if !interface.is_interface() {
            return Err(AopError::configuration(format!(
                "{} is not an interface",
                interface.name
            )));
        }
        self.push_interface(interface);
        Ok(())
    }

    pub(crate) fn push_interface(&mut self, interface: TypeDescriptor) {
        if !self.interfaces.iter().any(|known| known.name == interface.name) {
            self.interfaces.push(interface);
        }
    }

    /// 暴露目标类型实现的全部接口
    pub(crate) fn add_interfaces_of(&mut self, class: &TypeDescriptor) {
        for &name in class.interfaces {
            self.push_interface(TypeDescriptor::interface(name));
        }
    }

    pub fn interfaces(&self) -> &[TypeDescriptor] {
        &self.interfaces
    }

    // ========== 标志 ==========

    /// 强制使用子类代理
    pub fn set_proxy_target_class(&mut self, proxy_target_class: bool) {
        self.proxy_target_class = proxy_target_class;
    }

    pub fn is_proxy_target_class(&self) -> bool {
        self.proxy_target_class
    }

    pub fn set_optimize(&mut self, optimize: bool) {
        self.optimize = optimize;
    }

    pub fn is_optimize(&self) -> bool {
        self.optimize
    }

    /// 冻结后通知器列表和目标源不可再修改
    pub fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// opaque 代理不允许通过 `advised()` 查看配置
    pub fn set_opaque(&mut self, opaque: bool) {
        self.opaque = opaque;
    }

    pub fn is_opaque(&self) -> bool {
        self.opaque
    }

    /// 调用期间通过 [`AopContext`](crate::AopContext) 暴露当前代理
    pub fn set_expose_proxy(&mut self, expose_proxy: bool) {
        self.expose_proxy = expose_proxy;
    }

    pub fn is_expose_proxy(&self) -> bool {
        self.expose_proxy
    }

    /// 结束构建阶段
    ///
    /// 没有设置目标源时返回配置错误
    pub fn freeze(self) -> AopResult<Arc<AdvisedConfig>> {
        let target_source = self
            .target_source
            .ok_or_else(|| AopError::configuration("No target source configured"))?;

        tracing::debug!(
            advisors = self.advisors.len(),
            interfaces = self.interfaces.len(),
            target_source = target_source.name(),
            static_target = target_source.is_static(),
            "Freezing proxy configuration"
        );

        Ok(Arc::new(AdvisedConfig {
            advisors: self.advisors.into(),
            target_source,
            interfaces: self.interfaces.into(),
            proxy_target_class: self.proxy_target_class,
            optimize: self.optimize,
            opaque: self.opaque,
            expose_proxy: self.expose_proxy,
            chains: ChainFactory::new(),
        }))
    }
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("advisors", &self.advisors.iter().map(|a| a.name()).collect::<Vec<_>>())
            .field("target_source", &self.target_source.as_ref().map(|s| s.name()))
            .field("interfaces", &self.interfaces)
            .field("proxy_target_class", &self.proxy_target_class)
            .field("optimize", &self.optimize)
            .field("frozen", &self.frozen)
            .finish()
    }
}

/// 冻结后的代理配置
///
/// 通知器列表、目标源和接口集合都不再变化，读取无需加锁
pub struct AdvisedConfig {
    advisors: Arc<[Arc<dyn Advisor>]>,
    target_source: Arc<dyn TargetSource>,
    interfaces: Arc<[TypeDescriptor]>,
    proxy_target_class: bool,
    optimize: bool,
    opaque: bool,
    expose_proxy: bool,
    chains: ChainFactory,
}

impl AdvisedConfig {
    pub fn advisors(&self) -> &[Arc<dyn Advisor>] {
        &self.advisors
    }

    pub fn target_source(&self) -> &Arc<dyn TargetSource> {
        &self.target_source
    }

    pub fn target_class(&self) -> Option<TypeDescriptor> {
        self.target_source.target_class()
    }

    /// 用户配置的接口（不含标记接口）
    pub fn proxied_interfaces(&self) -> &[TypeDescriptor] {
        &self.interfaces
    }

    /// 是否没有用户配置的接口
    pub fn has_no_user_interfaces(&self) -> bool {
        self.interfaces.iter().all(|interface| interface.name == MANAGED_PROXY)
    }

    pub fn is_proxy_target_class(&self) -> bool {
        self.proxy_target_class
    }

    pub fn is_optimize(&self) -> bool {
        self.optimize
    }

    pub fn is_opaque(&self) -> bool {
        self.opaque
    }

    pub fn is_expose_proxy(&self) -> bool {
        self.expose_proxy
    }

    /// 该方法作用在 `target_class` 上时适用的调用链（静态匹配结果已缓存）
    pub(crate) fn chain_for(&self, method: &Method, target_class: Option<TypeDescriptor>) -> Chain {
        self.chains.chain_for(&self.advisors, method, target_class)
    }

    /// 回到构建阶段的可变副本
    pub fn to_proxy_config(&self) -> ProxyConfig {
        ProxyConfig {
            advisors: self.advisors.to_vec(),
            target_source: Some(self.target_source.clone()),
            interfaces: self.interfaces.to_vec(),
            proxy_target_class: self.proxy_target_class,
            optimize: self.optimize,
            frozen: false,
            opaque: self.opaque,
            expose_proxy: self.expose_proxy,
        }
    }
}

impl fmt::Debug for AdvisedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdvisedConfig")
            .field("advisors", &self.advisors.iter().map(|a| a.name()).collect::<Vec<_>>())
            .field("target_source", &self.target_source.name())
            .field("interfaces", &self.interfaces)
            .field("proxy_target_class", &self.proxy_target_class)
            .field("optimize", &self.optimize)
            .field("opaque", &self.opaque)
            .field("expose_proxy", &self.expose_proxy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::DefaultPointcutAdvisor;
    use crate::testing::{BankAccount, MethodNameRecorder, Trace, ACCOUNT, BANK_ACCOUNT, WITHDRAW};

    fn named(name: &str, order: i32) -> Arc<dyn Advisor> {
        Arc::new(
            DefaultAdvisor::new(Advice::before(MethodNameRecorder {
                trace: Trace::default(),
            }))
            .with_name(name)
            .with_order(order),
        )
    }

    #[test]
    fn test_advisor_list_editing() {
        let mut config = ProxyConfig::new();
        config.add_advisor(named("a", 0)).unwrap();
        config.add_advisor(named("c", 0)).unwrap();
        config.insert_advisor(1, named("b", 0)).unwrap();
        assert!(config.insert_advisor(9, named("z", 0)).is_err());

        let names: Vec<&str> = config.advisors().iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        assert!(config.remove_advisor("b").unwrap());
        assert!(!config.remove_advisor("b").unwrap());
        assert_eq!(config.advisors().len(), 2);
    }

    #[test]
    fn test_sort_by_order() {
        let mut config = ProxyConfig::new();
        config.add_advisor(named("second", 2)).unwrap();
        config.add_advisor(named("first", 1)).unwrap();
        config.sort_advisors().unwrap();

        let names: Vec<&str> = config.advisors().iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_frozen_flag_rejects_mutation() {
        let mut config = ProxyConfig::new();
        config.set_target(Arc::new(BankAccount::new(10))).unwrap();
        config.set_frozen(true);

        assert!(matches!(
            config.add_advisor(named("late", 0)),
            Err(AopError::ConfigFrozen(_))
        ));
        assert!(matches!(
            config.set_target(Arc::new(BankAccount::new(20))),
            Err(AopError::ConfigFrozen(_))
        ));

        // 标志仍可调整
        config.set_proxy_target_class(true);
        assert!(config.is_proxy_target_class());
    }

    #[test]
    fn test_interfaces_are_deduplicated_and_checked() {
        let mut config = ProxyConfig::new();
        config.add_interface(ACCOUNT).unwrap();
        config.add_interfaces_of(&BANK_ACCOUNT);
        assert_eq!(config.interfaces().len(), 1);

        let err = config.add_interface(BANK_ACCOUNT).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_freeze_requires_target_source() {
        let err = ProxyConfig::new().freeze().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_frozen_config_caches_chains() {
        let mut config = ProxyConfig::new();
        config.set_target(Arc::new(BankAccount::new(10))).unwrap();
        config
            .add_advisor(Arc::new(DefaultPointcutAdvisor::for_methods(
                ["withdraw"],
                Advice::before(MethodNameRecorder {
                    trace: Trace::default(),
                }),
            )))
            .unwrap();

        let advised = config.freeze().unwrap();
        assert_eq!(advised.target_class(), Some(BANK_ACCOUNT));
        assert!(advised.has_no_user_interfaces());

        let first = advised.chain_for(&WITHDRAW, advised.target_class());
        let second = advised.chain_for(&WITHDRAW, advised.target_class());
        assert_eq!(first.len(), 1);
        assert!(Arc::ptr_eq(&first, &second));

        let copy = advised.to_proxy_config();
        assert!(!copy.is_frozen());
        assert_eq!(copy.advisors().len(), 1);
    }
}
