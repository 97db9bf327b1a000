//! 代理创建
//!
//! 代理策略是一张纯决策表（[`ProxyStrategy::select`]），与代理的构造过程分开。
//! Rust 无法在运行时合成子类，两种策略都以组合的方式实现：
//! - [`InterfaceProxy`]：只接受声明在暴露接口上的方法
//! - [`SubclassProxy`]：接受目标类型本身及其实现的接口上的方法

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::advice::Advice;
use crate::advisor::Advisor;
use crate::config::{AdvisedConfig, ProxyConfig};
use crate::dispatcher::InvocationDispatcher;
use crate::error::{AopError, AopResult, Result};
use crate::method::{Arguments, Method, ReturnValue, TypeDescriptor, ADVISED, MANAGED_PROXY};
use crate::target::{SingletonTargetSource, Target, TargetSource};

tokio::task_local! {
    static CURRENT_PROXY: AopProxy;
}

/// 代理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyStrategy {
    /// 基于接口
    Interface,
    /// 基于子类
    Subclass,
}

impl ProxyStrategy {
    /// 选择代理策略
    ///
    /// 1. `optimize`、`proxy_target_class` 或没有用户接口时倾向子类代理
    /// 2. 此时目标类型本身是接口，退回接口代理
    /// 3. 此时目标类型未知，配置错误
    /// 4. 其余情况使用接口代理
    pub fn select(
        optimize: bool,
        proxy_target_class: bool,
        user_interfaces: &[TypeDescriptor],
        target_class: Option<TypeDescriptor>,
    ) -> AopResult<Self> {
        let no_user_interfaces = user_interfaces
            .iter()
            .all(|interface| interface.name == MANAGED_PROXY);

        if !(optimize || proxy_target_class || no_user_interfaces) {
            return Ok(ProxyStrategy::Interface);
        }

        match target_class {
            Some(class) if class.is_interface() => Ok(ProxyStrategy::Interface),
            Some(_) => Ok(ProxyStrategy::Subclass),
            None => Err(AopError::configuration(
                "TargetSource cannot determine target class: \
                 either an interface or a target is required for proxy creation",
            )),
        }
    }

    /// 按冻结配置选择
    pub fn for_config(config: &AdvisedConfig) -> AopResult<Self> {
        Self::select(
            config.is_optimize(),
            config.is_proxy_target_class(),
            config.proxied_interfaces(),
            config.target_class(),
        )
    }
}

/// 代理工厂 Trait
pub trait AopProxyFactory: Send + Sync {
    fn create_aop_proxy(&self, config: Arc<AdvisedConfig>) -> AopResult<AopProxy>;
}

/// 默认代理工厂
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAopProxyFactory;

impl AopProxyFactory for DefaultAopProxyFactory {
    fn create_aop_proxy(&self, config: Arc<AdvisedConfig>) -> AopResult<AopProxy> {
        let strategy = ProxyStrategy::for_config(&config)?;

        let proxy = match strategy {
            ProxyStrategy::Interface => {
                let interfaces = complete_proxied_interfaces(&config);
                AopProxy::Interface(InterfaceProxy {
                    dispatcher: Arc::new(InvocationDispatcher::new(config)),
                    interfaces: interfaces.into(),
                })
            }
            ProxyStrategy::Subclass => {
                // select 已保证 Subclass 分支的目标类型存在
                let superclass = config.target_class().ok_or_else(|| {
                    AopError::configuration("Subclass proxy requires a target class")
                })?;
                AopProxy::Subclass(SubclassProxy {
                    dispatcher: Arc::new(InvocationDispatcher::new(config)),
                    superclass,
                })
            }
        };

        tracing::debug!(
            strategy = ?strategy,
            exposed = ?proxy.exposed_types(),
            "Created AOP proxy"
        );
        Ok(proxy)
    }
}

/// 接口代理实际暴露的类型：用户接口（没有时取接口类型的目标）加上标记接口
fn complete_proxied_interfaces(config: &AdvisedConfig) -> Vec<&'static str> {
    let mut names: Vec<&'static str> = config
        .proxied_interfaces()
        .iter()
        .map(|interface| interface.name)
        .collect();

    if config.has_no_user_interfaces() {
        if let Some(class) = config.target_class().filter(TypeDescriptor::is_interface) {
            names.push(class.name);
        }
    }
    if !names.contains(&MANAGED_PROXY) {
        names.push(MANAGED_PROXY);
    }
    if !config.is_opaque() && !names.contains(&ADVISED) {
        names.push(ADVISED);
    }
    names
}

/// 由配置创建代理
///
/// 配置会被冻结；无法确定代理策略时返回配置错误，不会创建任何代理
pub fn create_proxy(config: ProxyConfig) -> AopResult<AopProxy> {
    DefaultAopProxyFactory.create_aop_proxy(config.freeze()?)
}

/// 基于接口的代理
#[derive(Clone)]
pub struct InterfaceProxy {
    dispatcher: Arc<InvocationDispatcher>,
    interfaces: Arc<[&'static str]>,
}

impl InterfaceProxy {
    /// 代理实现的全部接口，包括标记接口
    pub fn proxied_interfaces(&self) -> &[&'static str] {
        &self.interfaces
    }

    pub fn implements(&self, interface: &str) -> bool {
        self.interfaces.iter().any(|name| *name == interface)
    }
}

/// 基于子类的代理
#[derive(Clone)]
pub struct SubclassProxy {
    dispatcher: Arc<InvocationDispatcher>,
    superclass: TypeDescriptor,
}

impl SubclassProxy {
    pub fn superclass(&self) -> TypeDescriptor {
        self.superclass
    }
}

/// AOP 代理
///
/// 克隆代理只复制引用，所有克隆共享同一个分发器
#[derive(Clone)]
pub enum AopProxy {
    Interface(InterfaceProxy),
    Subclass(SubclassProxy),
}

impl AopProxy {
    pub fn strategy(&self) -> ProxyStrategy {
        match self {
            AopProxy::Interface(_) => ProxyStrategy::Interface,
            AopProxy::Subclass(_) => ProxyStrategy::Subclass,
        }
    }

    fn dispatcher(&self) -> &Arc<InvocationDispatcher> {
        match self {
            AopProxy::Interface(proxy) => &proxy.dispatcher,
            AopProxy::Subclass(proxy) => &proxy.dispatcher,
        }
    }

    /// 代理的配置，opaque 代理返回 None
    pub fn advised(&self) -> Option<&Arc<AdvisedConfig>> {
        let config = self.dispatcher().config();
        (!config.is_opaque()).then_some(config)
    }

    /// 代理对外可见的类型
    pub fn exposed_types(&self) -> Vec<&'static str> {
        match self {
            AopProxy::Interface(proxy) => proxy.interfaces.to_vec(),
            AopProxy::Subclass(proxy) => {
                let mut types = vec![proxy.superclass.name];
                types.extend_from_slice(proxy.superclass.interfaces);
                types.push(MANAGED_PROXY);
                if !proxy.dispatcher.config().is_opaque() {
                    types.push(ADVISED);
                }
                types
            }
        }
    }

    /// 代理是否可以被当作指定类型使用
    pub fn is_instance_of(&self, type_name: &str) -> bool {
        self.exposed_types().iter().any(|name| *name == type_name)
    }

    /// 方法是否在代理的可见范围内
    pub fn accepts(&self, method: &Method) -> bool {
        match self {
            AopProxy::Interface(proxy) => proxy.implements(method.declaring_type),
            AopProxy::Subclass(proxy) => proxy.superclass.is_assignable_to(method.declaring_type),
        }
    }

    /// 调用代理方法
    pub async fn call(&self, method: &Method, arguments: Arguments) -> Result<ReturnValue> {
        if !self.accepts(method) {
            return Err(AopError::MethodNotProxied(method.signature()).into());
        }

        let dispatcher = self.dispatcher();
        if dispatcher.config().is_expose_proxy() {
            CURRENT_PROXY
                .scope(self.clone(), dispatcher.dispatch(method, arguments))
                .await
        } else {
            dispatcher.dispatch(method, arguments).await
        }
    }
}

#[async_trait]
impl Target for AopProxy {
    fn type_descriptor(&self) -> TypeDescriptor {
        match self {
            AopProxy::Subclass(proxy) => proxy.superclass,
            AopProxy::Interface(proxy) => {
                TypeDescriptor::interface(proxy.interfaces.first().copied().unwrap_or(MANAGED_PROXY))
            }
        }
    }

    async fn invoke(&self, method: &Method, args: &Arguments) -> Result<ReturnValue> {
        self.call(method, args.clone()).await
    }
}

impl fmt::Debug for AopProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AopProxy")
            .field("strategy", &self.strategy())
            .field("exposed", &self.exposed_types())
            .field("config", self.dispatcher().config())
            .finish()
    }
}

/// 调用期间的代理上下文
pub struct AopContext;

impl AopContext {
    /// 当前正在执行的代理
    ///
    /// 只有配置了 `expose_proxy` 的代理在调用期间才会设置
    pub fn current_proxy() -> Option<AopProxy> {
        CURRENT_PROXY.try_with(AopProxy::clone).ok()
    }
}

/// 编程式创建代理
///
/// ```ignore
/// let mut factory = ProxyFactory::new(Arc::new(BankAccount::new(100)));
/// factory.add_advice(Advice::around(TraceInterceptor::default()))?;
/// let proxy = factory.get_proxy()?;
/// ```
pub struct ProxyFactory {
    config: ProxyConfig,
    aop_proxy_factory: Arc<dyn AopProxyFactory>,
}

impl ProxyFactory {
    /// 代理固定对象，默认暴露该对象实现的全部接口
    pub fn new(target: Arc<dyn Target>) -> Self {
        let class = target.type_descriptor();
        let mut config = ProxyConfig::with_target_source(Arc::new(SingletonTargetSource::new(target)));
        config.add_interfaces_of(&class);
        Self::from_config(config)
    }

    pub fn with_target_source(target_source: Arc<dyn TargetSource>) -> Self {
        Self::from_config(ProxyConfig::with_target_source(target_source))
    }

    pub fn from_config(config: ProxyConfig) -> Self {
        Self {
            config,
            aop_proxy_factory: Arc::new(DefaultAopProxyFactory),
        }
    }

    /// 替换底层代理工厂
    pub fn set_aop_proxy_factory(&mut self, factory: Arc<dyn AopProxyFactory>) {
        self.aop_proxy_factory = factory;
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ProxyConfig {
        &mut self.config
    }

    pub fn add_advice(&mut self, advice: Advice) -> AopResult<()> {
        self.config.add_advice(advice)
    }

    pub fn add_advisor(&mut self, advisor: Arc<dyn Advisor>) -> AopResult<()> {
        self.config.add_advisor(advisor)
    }

    pub fn add_interface(&mut self, interface: TypeDescriptor) -> AopResult<()> {
        self.config.add_interface(interface)
    }

    pub fn set_proxy_target_class(&mut self, proxy_target_class: bool) {
        self.config.set_proxy_target_class(proxy_target_class);
    }

    pub fn get_proxy(self) -> AopResult<AopProxy> {
        self.aop_proxy_factory.create_aop_proxy(self.config.freeze()?)
    }
}
