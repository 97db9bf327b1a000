//! 类型过滤器与方法匹配器
//!
//! 两者都是纯函数：不产生副作用，可并发重复调用。
//! 方法匹配分为两条路径：静态匹配只看签名，结果可以缓存；
//! 运行时匹配（`is_runtime() == true`）还要在每次调用时检查实参，结果绝不缓存。

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::method::{Arguments, Method, TypeDescriptor};

/// 类型过滤器
pub trait ClassFilter: Send + Sync {
    fn matches(&self, target_class: &TypeDescriptor) -> bool;
}

impl<F> ClassFilter for F
where
    F: Fn(&TypeDescriptor) -> bool + Send + Sync,
{
    fn matches(&self, target_class: &TypeDescriptor) -> bool {
        self(target_class)
    }
}

/// 方法匹配器
pub trait MethodMatcher: Send + Sync {
    /// 静态匹配，只依赖签名和目标类型
    fn matches(&self, method: &Method, target_class: &TypeDescriptor) -> bool;

    /// 是否需要在调用时用实参再次匹配
    fn is_runtime(&self) -> bool {
        false
    }

    /// 运行时匹配
    ///
    /// 仅当 `is_runtime()` 为 true 且静态匹配已通过时调用
    fn matches_with_args(
        &self,
        _method: &Method,
        _target_class: &TypeDescriptor,
        _args: &Arguments,
    ) -> bool {
        true
    }

    /// 是否对所有方法都返回 true（用于跳过匹配的快速路径）
    fn is_match_all(&self) -> bool {
        false
    }
}

impl<F> MethodMatcher for F
where
    F: Fn(&Method, &TypeDescriptor) -> bool + Send + Sync,
{
    fn matches(&self, method: &Method, target_class: &TypeDescriptor) -> bool {
        self(method, target_class)
    }
}

/// 匹配所有类型
#[derive(Debug, Clone, Copy, Default)]
pub struct TrueClassFilter;

impl ClassFilter for TrueClassFilter {
    fn matches(&self, _target_class: &TypeDescriptor) -> bool {
        true
    }
}

/// 匹配所有方法
#[derive(Debug, Clone, Copy, Default)]
pub struct TrueMethodMatcher;

impl MethodMatcher for TrueMethodMatcher {
    fn matches(&self, _method: &Method, _target_class: &TypeDescriptor) -> bool {
        true
    }

    fn is_match_all(&self) -> bool {
        true
    }
}

/// 匹配可以赋值给指定类型的目标
#[derive(Debug, Clone)]
pub struct TypeClassFilter {
    type_name: String,
}

impl TypeClassFilter {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
        }
    }
}

impl ClassFilter for TypeClassFilter {
    fn matches(&self, target_class: &TypeDescriptor) -> bool {
        target_class.is_assignable_to(&self.type_name)
    }
}

/// 类型过滤器组合
pub struct ClassFilters;

impl ClassFilters {
    pub fn union(filters: Vec<Arc<dyn ClassFilter>>) -> Arc<dyn ClassFilter> {
        Arc::new(move |class: &TypeDescriptor| filters.iter().any(|f| f.matches(class)))
    }

    pub fn intersection(filters: Vec<Arc<dyn ClassFilter>>) -> Arc<dyn ClassFilter> {
        Arc::new(move |class: &TypeDescriptor| filters.iter().all(|f| f.matches(class)))
    }

    pub fn negate(filter: Arc<dyn ClassFilter>) -> Arc<dyn ClassFilter> {
        Arc::new(move |class: &TypeDescriptor| !filter.matches(class))
    }
}

/// 简单通配符匹配
///
/// 支持的模式：
/// - `*` - 匹配任意字符串
/// - `get*` - 以 get 开头
/// - `*Service` - 以 Service 结尾
/// - `*Service*` - 包含 Service
/// - `find*_by_*` - 多段通配
pub fn simple_match(pattern: &str, target: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == target;
    }

    let segments: Vec<&str> = pattern.split('*').collect();
    let (first, rest) = match segments.split_first() {
        Some(split) => split,
        None => return false,
    };
    let Some(mut remaining) = target.strip_prefix(first) else {
        return false;
    };

    let last_index = rest.len().saturating_sub(1);
    for (i, segment) in rest.iter().enumerate() {
        if i == last_index {
            return remaining.ends_with(segment);
        }
        if segment.is_empty() {
            continue;
        }
        match remaining.find(segment) {
            Some(pos) => remaining = &remaining[pos + segment.len()..],
            None => return false,
        }
    }

    true
}

/// 按方法名通配符匹配
#[derive(Debug, Clone, Default)]
pub struct NameMatchMethodMatcher {
    patterns: Vec<String>,
}

impl NameMatchMethodMatcher {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn add_name(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(pattern.into());
        self
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl MethodMatcher for NameMatchMethodMatcher {
    fn matches(&self, method: &Method, _target_class: &TypeDescriptor) -> bool {
        self.patterns
            .iter()
            .any(|pattern| simple_match(pattern, method.name))
    }
}

/// 按正则匹配 `声明类型.方法名`
#[derive(Debug, Clone)]
pub struct RegexMethodMatcher {
    patterns: Vec<Regex>,
    excluded: Vec<Regex>,
}

impl RegexMethodMatcher {
    pub fn new(patterns: &[&str]) -> Result<Self, regex::Error> {
        Ok(Self {
            patterns: patterns
                .iter()
                .map(|p| Regex::new(p))
                .collect::<Result<_, _>>()?,
            excluded: Vec::new(),
        })
    }

    pub fn exclude(mut self, patterns: &[&str]) -> Result<Self, regex::Error> {
        for pattern in patterns {
            self.excluded.push(Regex::new(pattern)?);
        }
        Ok(self)
    }
}

impl MethodMatcher for RegexMethodMatcher {
    fn matches(&self, method: &Method, _target_class: &TypeDescriptor) -> bool {
        let qualified = format!("{}.{}", method.declaring_type, method.name);
        self.patterns.iter().any(|re| re.is_match(&qualified))
            && !self.excluded.iter().any(|re| re.is_match(&qualified))
    }
}

type ArgsPredicate = Arc<dyn Fn(&Arguments) -> bool + Send + Sync>;

/// 运行时匹配器：方法名静态预检，再用实参判断
#[derive(Clone)]
pub struct ArgumentMethodMatcher {
    names: NameMatchMethodMatcher,
    predicate: ArgsPredicate,
}

impl ArgumentMethodMatcher {
    pub fn new<F>(method_pattern: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Arguments) -> bool + Send + Sync + 'static,
    {
        let pattern: String = method_pattern.into();
        Self {
            names: NameMatchMethodMatcher::new([pattern]),
            predicate: Arc::new(predicate),
        }
    }
}

impl MethodMatcher for ArgumentMethodMatcher {
    fn matches(&self, method: &Method, target_class: &TypeDescriptor) -> bool {
        self.names.matches(method, target_class)
    }

    fn is_runtime(&self) -> bool {
        true
    }

    fn matches_with_args(
        &self,
        _method: &Method,
        _target_class: &TypeDescriptor,
        args: &Arguments,
    ) -> bool {
        (self.predicate)(args)
    }
}

impl fmt::Debug for ArgumentMethodMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgumentMethodMatcher")
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

/// 方法匹配器组合
pub struct MethodMatchers;

impl MethodMatchers {
    pub fn union(a: Arc<dyn MethodMatcher>, b: Arc<dyn MethodMatcher>) -> Arc<dyn MethodMatcher> {
        Arc::new(UnionMethodMatcher { a, b })
    }

    pub fn intersection(
        a: Arc<dyn MethodMatcher>,
        b: Arc<dyn MethodMatcher>,
    ) -> Arc<dyn MethodMatcher> {
        Arc::new(IntersectionMethodMatcher { a, b })
    }
}

/// 一侧匹配器在运行时是否命中（静态 + 可能的实参检查）
fn side_matches(
    matcher: &dyn MethodMatcher,
    method: &Method,
    target_class: &TypeDescriptor,
    args: &Arguments,
) -> bool {
    matcher.matches(method, target_class)
        && (!matcher.is_runtime() || matcher.matches_with_args(method, target_class, args))
}

struct UnionMethodMatcher {
    a: Arc<dyn MethodMatcher>,
    b: Arc<dyn MethodMatcher>,
}

impl MethodMatcher for UnionMethodMatcher {
    fn matches(&self, method: &Method, target_class: &TypeDescriptor) -> bool {
        self.a.matches(method, target_class) || self.b.matches(method, target_class)
    }

    fn is_runtime(&self) -> bool {
        self.a.is_runtime() || self.b.is_runtime()
    }

    fn matches_with_args(
        &self,
        method: &Method,
        target_class: &TypeDescriptor,
        args: &Arguments,
    ) -> bool {
        side_matches(self.a.as_ref(), method, target_class, args)
            || side_matches(self.b.as_ref(), method, target_class, args)
    }

    fn is_match_all(&self) -> bool {
        self.a.is_match_all() || self.b.is_match_all()
    }
}

struct IntersectionMethodMatcher {
    a: Arc<dyn MethodMatcher>,
    b: Arc<dyn MethodMatcher>,
}

impl MethodMatcher for IntersectionMethodMatcher {
    fn matches(&self, method: &Method, target_class: &TypeDescriptor) -> bool {
        self.a.matches(method, target_class) && self.b.matches(method, target_class)
    }

    fn is_runtime(&self) -> bool {
        self.a.is_runtime() || self.b.is_runtime()
    }

    fn matches_with_args(
        &self,
        method: &Method,
        target_class: &TypeDescriptor,
        args: &Arguments,
    ) -> bool {
        // 静态部分已经通过，这里只补充运行时一侧
        (!self.a.is_runtime() || self.a.matches_with_args(method, target_class, args))
            && (!self.b.is_runtime() || self.b.matches_with_args(method, target_class, args))
    }

    fn is_match_all(&self) -> bool {
        self.a.is_match_all() && self.b.is_match_all()
    }
}
