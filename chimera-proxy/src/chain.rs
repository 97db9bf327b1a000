//! 调用链装配
//!
//! 静态匹配结果按 `(方法, 目标类型)` 缓存；运行时匹配器只在装配时做静态预检，
//! 真正的实参匹配推迟到每次调用（见 [`MethodInvocation::proceed`](crate::MethodInvocation::proceed)）。

use std::sync::Arc;

use dashmap::DashMap;

use crate::advice::MethodInterceptor;
use crate::advisor::Advisor;
use crate::matcher::MethodMatcher;
use crate::method::{Method, TypeDescriptor};

/// 调用链上的一个元素
#[derive(Clone)]
pub(crate) enum ChainEntry {
    /// 静态匹配已经确定适用
    Static(Arc<dyn MethodInterceptor>),
    /// 每次调用都要用实参重新匹配
    Dynamic {
        interceptor: Arc<dyn MethodInterceptor>,
        matcher: Arc<dyn MethodMatcher>,
    },
}

impl ChainEntry {
    pub(crate) fn is_dynamic(&self) -> bool {
        matches!(self, ChainEntry::Dynamic { .. })
    }
}

pub(crate) type Chain = Arc<[ChainEntry]>;

type ChainKey = (Method, &'static str);

/// 带缓存的调用链工厂
///
/// 通知器列表冻结后不再变化，缓存结果在代理整个生命周期内有效
pub(crate) struct ChainFactory {
    cache: DashMap<ChainKey, Chain>,
}

impl ChainFactory {
    pub(crate) fn new() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }

    /// 获取方法的调用链，未命中时装配并缓存
    pub(crate) fn chain_for(
        &self,
        advisors: &[Arc<dyn Advisor>],
        method: &Method,
        target_class: Option<TypeDescriptor>,
    ) -> Chain {
        let class = TypeDescriptor::effective(target_class, method);
        let key = (*method, class.name);

        if let Some(chain) = self.cache.get(&key) {
            return chain.clone();
        }

        let chain = build_chain(advisors, method, &class);
        tracing::debug!(
            method = %method,
            target_class = class.name,
            advisors = advisors.len(),
            applicable = chain.len(),
            dynamic = chain.iter().filter(|entry| entry.is_dynamic()).count(),
            "Assembled interceptor chain"
        );

        self.cache.entry(key).or_insert(chain).clone()
    }

    pub(crate) fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

fn build_chain(advisors: &[Arc<dyn Advisor>], method: &Method, class: &TypeDescriptor) -> Chain {
    let mut chain = Vec::with_capacity(advisors.len());

    for advisor in advisors {
        let pointcut = match advisor.pointcut() {
            Some(pointcut) if !pointcut.is_match_all() => pointcut,
            // 无切点或“匹配一切”切点：跳过过滤
            _ => {
                chain.push(ChainEntry::Static(advisor.advice().to_interceptor()));
                continue;
            }
        };

        if !pointcut.class_filter().matches(class) {
            continue;
        }

        let matcher = pointcut.method_matcher();
        if !matcher.matches(method, class) {
            continue;
        }

        let interceptor = advisor.advice().to_interceptor();
        if matcher.is_runtime() {
            chain.push(ChainEntry::Dynamic {
                interceptor,
                matcher,
            });
        } else {
            chain.push(ChainEntry::Static(interceptor));
        }
    }

    chain.into()
}
