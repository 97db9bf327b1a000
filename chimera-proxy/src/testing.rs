//! 测试夹具：银行账户目标、记录执行轨迹的通知、计数目标源

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::advice::{BeforeAdvice, MethodInterceptor};
use crate::error::{AopError, AopResult, Result};
use crate::joinpoint::{JoinPoint, MethodInvocation};
use crate::method::{Arguments, Method, ReturnValue, TypeDescriptor};
use crate::target::{no_such_method, Target, TargetSource};

pub const ACCOUNT: TypeDescriptor = TypeDescriptor::interface("Account");
pub const BANK_ACCOUNT: TypeDescriptor = TypeDescriptor::class("BankAccount").implementing(&["Account"]);

pub const WITHDRAW: Method = Method::new("Account", "withdraw").with_params(&["u64"]);
pub const DEPOSIT: Method = Method::new("Account", "deposit").with_params(&["u64"]);
pub const BALANCE: Method = Method::new("Account", "balance");
pub const AUDIT: Method = Method::new("BankAccount", "audit");

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("insufficient funds: balance {balance}, requested {requested}")]
pub struct InsufficientFunds {
    pub balance: u64,
    pub requested: u64,
}

pub struct BankAccount {
    balance: Mutex<u64>,
    calls: AtomicUsize,
}

impl BankAccount {
    pub fn new(balance: u64) -> Self {
        Self {
            balance: Mutex::new(balance),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn withdraw(&self, amount: u64) -> std::result::Result<u64, InsufficientFunds> {
        let mut balance = self.balance.lock();
        if amount > *balance {
            return Err(InsufficientFunds {
                balance: *balance,
                requested: amount,
            });
        }
        *balance -= amount;
        Ok(*balance)
    }
}

#[async_trait]
impl Target for BankAccount {
    fn type_descriptor(&self) -> TypeDescriptor {
        BANK_ACCOUNT
    }

    async fn invoke(&self, method: &Method, args: &Arguments) -> Result<ReturnValue> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match method.name {
            "withdraw" => {
                let amount = *args.require::<u64>(method, 0)?;
                Ok(ReturnValue::new(self.withdraw(amount)?))
            }
            "deposit" => {
                let amount = *args.require::<u64>(method, 0)?;
                let mut balance = self.balance.lock();
                *balance += amount;
                Ok(ReturnValue::new(*balance))
            }
            "balance" => Ok(ReturnValue::new(*self.balance.lock())),
            "audit" => Ok(ReturnValue::new("audited".to_string())),
            _ => Err(no_such_method(BANK_ACCOUNT.name, method)),
        }
    }
}

/// 共享的执行轨迹
#[derive(Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<String>>>);

impl Trace {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

/// 在轨迹里记录进入、退出和失败的环绕通知
pub struct Recorder {
    pub name: &'static str,
    pub trace: Trace,
}

#[async_trait]
impl MethodInterceptor for Recorder {
    async fn invoke(&self, invocation: MethodInvocation<'_>) -> Result<ReturnValue> {
        self.trace.push(format!("{}:before", self.name));
        let result = invocation.proceed().await;
        match &result {
            Ok(_) => self.trace.push(format!("{}:after", self.name)),
            Err(_) => self.trace.push(format!("{}:error", self.name)),
        }
        result
    }
}

/// 只记录方法名的前置通知
pub struct MethodNameRecorder {
    pub trace: Trace,
}

#[async_trait]
impl BeforeAdvice for MethodNameRecorder {
    async fn before(&self, join_point: &JoinPoint) -> Result<()> {
        self.trace.push(join_point.get_method_name());
        Ok(())
    }
}

/// 统计 get/release 次数的目标源
pub struct CountingTargetSource {
    inner: Arc<dyn TargetSource>,
    is_static: bool,
    fail_release: AtomicBool,
    pub gets: AtomicUsize,
    pub releases: AtomicUsize,
}

impl CountingTargetSource {
    pub fn new(inner: Arc<dyn TargetSource>, is_static: bool) -> Self {
        Self {
            inner,
            is_static,
            fail_release: AtomicBool::new(false),
            gets: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        }
    }

    pub fn fail_releases(&self) {
        self.fail_release.store(true, Ordering::SeqCst);
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl TargetSource for CountingTargetSource {
    fn target_class(&self) -> Option<TypeDescriptor> {
        self.inner.target_class()
    }

    fn is_static(&self) -> bool {
        self.is_static
    }

    fn get_target(&self) -> AopResult<Arc<dyn Target>> {
        let target = self.inner.get_target()?;
        self.gets.fetch_add(1, Ordering::SeqCst);
        Ok(target)
    }

    fn release_target(&self, target: Arc<dyn Target>) -> AopResult<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        if self.fail_release.load(Ordering::SeqCst) {
            let cause = std::io::Error::new(std::io::ErrorKind::Other, "release rejected");
            return Err(AopError::release_caused_by(self.name(), cause));
        }
        self.inner.release_target(target)
    }

    fn name(&self) -> &str {
        "CountingTargetSource"
    }
}

/// 总是无法提供目标对象的目标源
pub struct UnresolvableTargetSource;

impl TargetSource for UnresolvableTargetSource {
    fn target_class(&self) -> Option<TypeDescriptor> {
        Some(BANK_ACCOUNT)
    }

    fn is_static(&self) -> bool {
        false
    }

    fn get_target(&self) -> AopResult<Arc<dyn Target>> {
        Err(AopError::resolution(self.name(), "backend offline"))
    }

    fn release_target(&self, _target: Arc<dyn Target>) -> AopResult<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "UnresolvableTargetSource"
    }
}
