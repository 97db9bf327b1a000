//! 切点（Pointcut）
//!
//! 切点由类型过滤器和方法匹配器组成，定位到某些类型的某些方法。
//! [`true_pointcut`] 返回共享的“匹配一切”单例，调用链装配时遇到它会跳过全部匹配。

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::matcher::{
    simple_match, ClassFilter, ClassFilters, MethodMatcher, MethodMatchers,
    NameMatchMethodMatcher, TrueClassFilter, TrueMethodMatcher,
};
use crate::method::{Arguments, Method, TypeDescriptor};

/// 切点 Trait
pub trait Pointcut: Send + Sync {
    fn class_filter(&self) -> Arc<dyn ClassFilter>;

    fn method_matcher(&self) -> Arc<dyn MethodMatcher>;

    /// 是否匹配所有类型的所有方法
    fn is_match_all(&self) -> bool {
        false
    }
}

static TRUE_CLASS_FILTER: Lazy<Arc<dyn ClassFilter>> = Lazy::new(|| Arc::new(TrueClassFilter));
static TRUE_METHOD_MATCHER: Lazy<Arc<dyn MethodMatcher>> =
    Lazy::new(|| Arc::new(TrueMethodMatcher));
static TRUE_POINTCUT: Lazy<Arc<dyn Pointcut>> = Lazy::new(|| Arc::new(TruePointcut));

/// 匹配一切的切点
#[derive(Debug, Clone, Copy, Default)]
pub struct TruePointcut;

impl Pointcut for TruePointcut {
    fn class_filter(&self) -> Arc<dyn ClassFilter> {
        TRUE_CLASS_FILTER.clone()
    }

    fn method_matcher(&self) -> Arc<dyn MethodMatcher> {
        TRUE_METHOD_MATCHER.clone()
    }

    fn is_match_all(&self) -> bool {
        true
    }
}

/// 共享的“匹配一切”切点
pub fn true_pointcut() -> Arc<dyn Pointcut> {
    TRUE_POINTCUT.clone()
}

/// 是否就是 [`true_pointcut`] 返回的单例
pub fn is_true_pointcut(pointcut: &Arc<dyn Pointcut>) -> bool {
    Arc::ptr_eq(pointcut, &*TRUE_POINTCUT)
}

/// 可组合切点
#[derive(Clone)]
pub struct ComposablePointcut {
    class_filter: Arc<dyn ClassFilter>,
    method_matcher: Arc<dyn MethodMatcher>,
}

impl ComposablePointcut {
    pub fn new(class_filter: Arc<dyn ClassFilter>, method_matcher: Arc<dyn MethodMatcher>) -> Self {
        Self {
            class_filter,
            method_matcher,
        }
    }

    pub fn from_class_filter(class_filter: Arc<dyn ClassFilter>) -> Self {
        Self::new(class_filter, TRUE_METHOD_MATCHER.clone())
    }

    pub fn from_method_matcher(method_matcher: Arc<dyn MethodMatcher>) -> Self {
        Self::new(TRUE_CLASS_FILTER.clone(), method_matcher)
    }

    pub fn intersection_class_filter(mut self, other: Arc<dyn ClassFilter>) -> Self {
        self.class_filter = ClassFilters::intersection(vec![self.class_filter, other]);
        self
    }

    pub fn intersection_method_matcher(mut self, other: Arc<dyn MethodMatcher>) -> Self {
        self.method_matcher = MethodMatchers::intersection(self.method_matcher, other);
        self
    }

    pub fn union_method_matcher(mut self, other: Arc<dyn MethodMatcher>) -> Self {
        self.method_matcher = MethodMatchers::union(self.method_matcher, other);
        self
    }

    /// 与运算：类型和方法都必须同时满足
    pub fn intersection(self, other: &dyn Pointcut) -> Self {
        self.intersection_class_filter(other.class_filter())
            .intersection_method_matcher(other.method_matcher())
    }

    /// 或运算
    ///
    /// 方法匹配要带上各自的类型过滤器，否则一侧的方法会错误地应用到另一侧的类型上
    pub fn union(self, other: &dyn Pointcut) -> Self {
        let other_filter = other.class_filter();
        let method_matcher: Arc<dyn MethodMatcher> = Arc::new(ClassAwareUnion {
            a: (self.class_filter.clone(), self.method_matcher),
            b: (other_filter.clone(), other.method_matcher()),
        });
        Self {
            class_filter: ClassFilters::union(vec![self.class_filter, other_filter]),
            method_matcher,
        }
    }
}

impl Pointcut for ComposablePointcut {
    fn class_filter(&self) -> Arc<dyn ClassFilter> {
        self.class_filter.clone()
    }

    fn method_matcher(&self) -> Arc<dyn MethodMatcher> {
        self.method_matcher.clone()
    }
}

impl fmt::Debug for ComposablePointcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposablePointcut")
            .field("runtime", &self.method_matcher.is_runtime())
            .finish_non_exhaustive()
    }
}

type FilterAndMatcher = (Arc<dyn ClassFilter>, Arc<dyn MethodMatcher>);

struct ClassAwareUnion {
    a: FilterAndMatcher,
    b: FilterAndMatcher,
}

impl ClassAwareUnion {
    fn side_matches(side: &FilterAndMatcher, method: &Method, class: &TypeDescriptor) -> bool {
        side.0.matches(class) && side.1.matches(method, class)
    }
}

impl MethodMatcher for ClassAwareUnion {
    fn matches(&self, method: &Method, target_class: &TypeDescriptor) -> bool {
        Self::side_matches(&self.a, method, target_class)
            || Self::side_matches(&self.b, method, target_class)
    }

    fn is_runtime(&self) -> bool {
        self.a.1.is_runtime() || self.b.1.is_runtime()
    }

    fn matches_with_args(
        &self,
        method: &Method,
        target_class: &TypeDescriptor,
        args: &Arguments,
    ) -> bool {
        [&self.a, &self.b].into_iter().any(|side| {
            Self::side_matches(side, method, target_class)
                && (!side.1.is_runtime() || side.1.matches_with_args(method, target_class, args))
        })
    }
}

/// 按方法名匹配的切点
#[derive(Debug, Clone, Default)]
pub struct NameMatchPointcut {
    matcher: NameMatchMethodMatcher,
}

impl NameMatchPointcut {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            matcher: NameMatchMethodMatcher::new(names),
        }
    }
}

impl Pointcut for NameMatchPointcut {
    fn class_filter(&self) -> Arc<dyn ClassFilter> {
        TRUE_CLASS_FILTER.clone()
    }

    fn method_matcher(&self) -> Arc<dyn MethodMatcher> {
        Arc::new(self.matcher.clone())
    }
}

/// 切点表达式
///
/// 用于匹配连接点
#[derive(Clone)]
pub enum PointcutExpression {
    /// 匹配所有方法
    All,

    /// 匹配特定类型的所有方法
    /// 例如：TypePattern("UserService")
    TypePattern(String),

    /// 匹配特定方法名
    /// 例如：MethodPattern("get_user")
    MethodPattern(String),

    /// 匹配特定类型的特定方法
    /// 例如：execution(* UserService.get_user(..))
    Execution {
        type_pattern: String,
        method_pattern: String,
    },

    /// 使用正则表达式匹配类型
    TypeRegex(Regex),

    /// 使用正则表达式匹配方法
    MethodRegex(Regex),

    /// 自定义匹配函数
    Custom(Arc<dyn Fn(&TypeDescriptor, &Method) -> bool + Send + Sync>),

    /// 与运算（AND）
    And(Box<PointcutExpression>, Box<PointcutExpression>),

    /// 或运算（OR）
    Or(Box<PointcutExpression>, Box<PointcutExpression>),

    /// 非运算（NOT）
    Not(Box<PointcutExpression>),
}

impl PointcutExpression {
    /// 检查 (类型, 方法) 是否匹配
    pub fn matches(&self, class: &TypeDescriptor, method: &Method) -> bool {
        match self {
            PointcutExpression::All => true,

            PointcutExpression::TypePattern(pattern) => Self::type_matches(pattern, class, method),

            PointcutExpression::MethodPattern(pattern) => simple_match(pattern, method.name),

            PointcutExpression::Execution {
                type_pattern,
                method_pattern,
            } => {
                Self::type_matches(type_pattern, class, method)
                    && simple_match(method_pattern, method.name)
            }

            PointcutExpression::TypeRegex(regex) => regex.is_match(class.name),

            PointcutExpression::MethodRegex(regex) => regex.is_match(method.name),

            PointcutExpression::Custom(func) => func(class, method),

            PointcutExpression::And(left, right) => {
                left.matches(class, method) && right.matches(class, method)
            }

            PointcutExpression::Or(left, right) => {
                left.matches(class, method) || right.matches(class, method)
            }

            PointcutExpression::Not(expr) => !expr.matches(class, method),
        }
    }

    /// 类型模式匹配目标类型、它实现的接口或方法的声明类型
    fn type_matches(pattern: &str, class: &TypeDescriptor, method: &Method) -> bool {
        simple_match(pattern, class.name)
            || class.interfaces.iter().any(|i| simple_match(pattern, i))
            || simple_match(pattern, method.declaring_type)
    }

    /// 创建 execution 表达式
    ///
    /// 例如：`execution(* UserService.get_user(..))` 或 `* UserService.get_user(..)`
    /// 格式：返回类型 类型名.方法名(参数)
    ///
    /// 简化版本，只支持类型和方法名匹配
    pub fn execution(expression: &str) -> Self {
        let expression = expression.trim();
        let expression = expression
            .strip_prefix("execution(")
            .and_then(|inner| inner.strip_suffix(')'))
            .unwrap_or(expression);

        // 解析表达式: "* UserService.get_user(..)"
        let parts: Vec<&str> = expression.split_whitespace().collect();

        if parts.len() < 2 {
            return PointcutExpression::All;
        }

        let method_part = parts[1];
        // 移除参数部分 "(..)"
        let method_part = match method_part.find('(') {
            Some(pos) => &method_part[..pos],
            None => method_part,
        };

        if let Some((type_pattern, method_pattern)) = method_part.rsplit_once('.') {
            PointcutExpression::Execution {
                type_pattern: type_pattern.to_string(),
                method_pattern: method_pattern.to_string(),
            }
        } else {
            PointcutExpression::MethodPattern(method_part.to_string())
        }
    }

    /// 与运算
    pub fn and(self, other: PointcutExpression) -> Self {
        PointcutExpression::And(Box::new(self), Box::new(other))
    }

    /// 或运算
    pub fn or(self, other: PointcutExpression) -> Self {
        PointcutExpression::Or(Box::new(self), Box::new(other))
    }

    /// 非运算
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        PointcutExpression::Not(Box::new(self))
    }
}

impl MethodMatcher for PointcutExpression {
    fn matches(&self, method: &Method, target_class: &TypeDescriptor) -> bool {
        PointcutExpression::matches(self, target_class, method)
    }

    fn is_match_all(&self) -> bool {
        matches!(self, PointcutExpression::All)
    }
}

impl fmt::Debug for PointcutExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointcutExpression::All => write!(f, "All"),
            PointcutExpression::TypePattern(p) => write!(f, "TypePattern({})", p),
            PointcutExpression::MethodPattern(p) => write!(f, "MethodPattern({})", p),
            PointcutExpression::Execution { type_pattern, method_pattern } => {
                write!(f, "Execution({}.{})", type_pattern, method_pattern)
            }
            PointcutExpression::TypeRegex(re) => write!(f, "TypeRegex({})", re.as_str()),
            PointcutExpression::MethodRegex(re) => write!(f, "MethodRegex({})", re.as_str()),
            PointcutExpression::Custom(_) => write!(f, "Custom(...)"),
            PointcutExpression::And(l, r) => write!(f, "And({:?}, {:?})", l, r),
            PointcutExpression::Or(l, r) => write!(f, "Or({:?}, {:?})", l, r),
            PointcutExpression::Not(e) => write!(f, "Not({:?})", e),
        }
    }
}

/// 基于表达式的切点
#[derive(Debug, Clone)]
pub struct ExpressionPointcut {
    expression: Arc<PointcutExpression>,
}

impl ExpressionPointcut {
    pub fn new(expression: PointcutExpression) -> Self {
        Self {
            expression: Arc::new(expression),
        }
    }

    pub fn execution(expression: &str) -> Self {
        Self::new(PointcutExpression::execution(expression))
    }

    pub fn expression(&self) -> &PointcutExpression {
        &self.expression
    }
}

impl Pointcut for ExpressionPointcut {
    fn class_filter(&self) -> Arc<dyn ClassFilter> {
        TRUE_CLASS_FILTER.clone()
    }

    fn method_matcher(&self) -> Arc<dyn MethodMatcher> {
        self.expression.clone()
    }

    fn is_match_all(&self) -> bool {
        matches!(*self.expression, PointcutExpression::All)
    }
}

/// 切点能否作用于目标类型的任一候选方法
///
/// 运行时匹配器只做静态预检，实参要到调用时才知道
pub fn can_apply(pointcut: &dyn Pointcut, target_class: &TypeDescriptor, methods: &[Method]) -> bool {
    if pointcut.is_match_all() {
        return true;
    }
    if !pointcut.class_filter().matches(target_class) {
        return false;
    }

    let matcher = pointcut.method_matcher();
    if matcher.is_match_all() {
        return true;
    }
    methods.iter().any(|method| matcher.matches(method, target_class))
}
