//! 通知器（Advisor）
//!
//! 通知器把一个通知绑定到一个切点上。没有切点的通知器匹配所有方法。

use std::fmt;
use std::sync::Arc;

use crate::advice::Advice;
use crate::pointcut::{true_pointcut, NameMatchPointcut, Pointcut};

/// 最低优先级
pub const LOWEST_PRECEDENCE: i32 = i32::MAX;

/// 最高优先级
pub const HIGHEST_PRECEDENCE: i32 = i32::MIN;

/// 通知器 Trait
pub trait Advisor: Send + Sync {
    fn advice(&self) -> &Advice;

    /// 切点，None 表示匹配所有方法
    fn pointcut(&self) -> Option<Arc<dyn Pointcut>> {
        None
    }

    /// 是否按实例关联
    ///
    /// 调用链装配不读取该标志
    fn is_per_instance(&self) -> bool {
        true
    }

    /// 排序值，数值越小越靠外层
    fn order(&self) -> i32 {
        LOWEST_PRECEDENCE
    }

    fn name(&self) -> &str {
        "anonymous"
    }
}

/// 匹配所有方法的通知器
#[derive(Clone)]
pub struct DefaultAdvisor {
    name: String,
    advice: Advice,
    order: i32,
}

impl DefaultAdvisor {
    pub fn new(advice: Advice) -> Self {
        Self {
            name: format!("{:?}Advisor", advice.advice_type()),
            advice,
            order: LOWEST_PRECEDENCE,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }
}

impl Advisor for DefaultAdvisor {
    fn advice(&self) -> &Advice {
        &self.advice
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for DefaultAdvisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultAdvisor")
            .field("name", &self.name)
            .field("advice", &self.advice)
            .field("order", &self.order)
            .finish()
    }
}

/// 切点 + 通知
#[derive(Clone)]
pub struct DefaultPointcutAdvisor {
    name: String,
    pointcut: Arc<dyn Pointcut>,
    advice: Advice,
    order: i32,
    per_instance: bool,
}

impl DefaultPointcutAdvisor {
    pub fn new(pointcut: Arc<dyn Pointcut>, advice: Advice) -> Self {
        Self {
            name: format!("{:?}Advisor", advice.advice_type()),
            pointcut,
            advice,
            order: LOWEST_PRECEDENCE,
            per_instance: true,
        }
    }

    /// 使用共享的“匹配一切”切点
    pub fn matching_all(advice: Advice) -> Self {
        Self::new(true_pointcut(), advice)
    }

    /// 按方法名匹配
    pub fn for_methods<I, S>(names: I, advice: Advice) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Arc::new(NameMatchPointcut::new(names)), advice)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_per_instance(mut self, per_instance: bool) -> Self {
        self.per_instance = per_instance;
        self
    }
}

impl Advisor for DefaultPointcutAdvisor {
    fn advice(&self) -> &Advice {
        &self.advice
    }

    fn pointcut(&self) -> Option<Arc<dyn Pointcut>> {
        Some(self.pointcut.clone())
    }

    fn is_per_instance(&self) -> bool {
        self.per_instance
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for DefaultPointcutAdvisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultPointcutAdvisor")
            .field("name", &self.name)
            .field("advice", &self.advice)
            .field("order", &self.order)
            .field("match_all", &self.pointcut.is_match_all())
            .finish()
    }
}

/// 通知器注册器
///
/// 用于 inventory 自动收集通知器，由 [`AutoProxyCreator`](crate::AutoProxyCreator) 加载
pub struct AdvisorRegistration {
    /// 通知器名称
    pub name: &'static str,

    /// 创建通知器实例的函数
    pub creator: fn() -> Arc<dyn Advisor>,
}

impl AdvisorRegistration {
    pub const fn new(name: &'static str, creator: fn() -> Arc<dyn Advisor>) -> Self {
        Self { name, creator }
    }

    /// 创建通知器实例
    pub fn create_instance(&self) -> Arc<dyn Advisor> {
        (self.creator)()
    }
}

// 使用 inventory 收集所有通知器注册器
inventory::collect!(AdvisorRegistration);

/// 获取所有注册的通知器注册器
pub fn get_all_advisor_registrations() -> impl Iterator<Item = &'static AdvisorRegistration> {
    inventory::iter::<AdvisorRegistration>()
}

/// 按 `order()` 稳定排序，相同排序值保持原有顺序
pub fn sort_advisors(advisors: &mut [Arc<dyn Advisor>]) {
    advisors.sort_by_key(|advisor| advisor.order());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice::{AfterAdvice, MethodInterceptor};
    use crate::joinpoint::{JoinPoint, MethodInvocation};
    use crate::method::ReturnValue;
    use async_trait::async_trait;

    struct Passthrough;

    #[async_trait]
    impl MethodInterceptor for Passthrough {
        async fn invoke(&self, invocation: MethodInvocation<'_>) -> crate::Result<ReturnValue> {
            invocation.proceed().await
        }
    }

    struct Quiet;

    #[async_trait]
    impl AfterAdvice for Quiet {
        async fn after(&self, _join_point: &JoinPoint) {}
    }

    #[test]
    fn test_default_advisor_matches_everything() {
        let advisor = DefaultAdvisor::new(Advice::around(Passthrough));
        assert!(advisor.pointcut().is_none());
        assert!(advisor.is_per_instance());
        assert_eq!(advisor.order(), LOWEST_PRECEDENCE);
        assert_eq!(advisor.name(), "AroundAdvisor");
    }

    #[test]
    fn test_pointcut_advisor_builders() {
        let advisor = DefaultPointcutAdvisor::for_methods(["withdraw"], Advice::after(Quiet))
            .with_name("guard")
            .with_order(5)
            .with_per_instance(false);

        assert_eq!(advisor.name(), "guard");
        assert_eq!(advisor.order(), 5);
        assert!(!advisor.is_per_instance());
        assert!(!advisor.pointcut().unwrap().is_match_all());
        assert!(DefaultPointcutAdvisor::matching_all(Advice::after(Quiet))
            .pointcut()
            .unwrap()
            .is_match_all());
    }

    #[test]
    fn test_sort_is_stable() {
        let mut advisors: Vec<Arc<dyn Advisor>> = vec![
            Arc::new(DefaultAdvisor::new(Advice::after(Quiet)).with_name("late")),
            Arc::new(DefaultAdvisor::new(Advice::after(Quiet)).with_name("first").with_order(1)),
            Arc::new(DefaultAdvisor::new(Advice::after(Quiet)).with_name("later")),
        ];
        sort_advisors(&mut advisors);

        let names: Vec<&str> = advisors.iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["first", "late", "later"]);
    }
}
