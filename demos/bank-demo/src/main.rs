use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chimera_proxy::prelude::*;
use chimera_proxy::{
    ExceptionLoggingAdvice, PerformanceMonitorInterceptor, ProxySettings, TraceInterceptor,
};
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

// ==================== 业务类型 ====================

const BANK_ACCOUNT: TypeDescriptor = TypeDescriptor::class("BankAccount").implementing(&["Account"]);

const WITHDRAW: Method = Method::new("Account", "withdraw").with_params(&["u64"]);
const DEPOSIT: Method = Method::new("Account", "deposit").with_params(&["u64"]);
const BALANCE: Method = Method::new("Account", "balance");

#[derive(Debug, thiserror::Error)]
#[error("insufficient funds: balance {balance}, requested {requested}")]
struct InsufficientFunds {
    balance: u64,
    requested: u64,
}

struct BankAccount {
    owner: &'static str,
    balance: Mutex<u64>,
}

impl BankAccount {
    fn new(owner: &'static str, balance: u64) -> Self {
        Self {
            owner,
            balance: Mutex::new(balance),
        }
    }
}

#[async_trait]
impl Target for BankAccount {
    fn type_descriptor(&self) -> TypeDescriptor {
        BANK_ACCOUNT
    }

    async fn invoke(&self, method: &Method, args: &Arguments) -> Result<ReturnValue> {
        let mut balance = self.balance.lock();
        match method.name {
            "withdraw" => {
                let amount = *args.require::<u64>(method, 0)?;
                if amount > *balance {
                    return Err(InsufficientFunds {
                        balance: *balance,
                        requested: amount,
                    }
                    .into());
                }
                *balance -= amount;
                Ok(ReturnValue::new(*balance))
            }
            "deposit" => {
                *balance += *args.require::<u64>(method, 0)?;
                Ok(ReturnValue::new(*balance))
            }
            "balance" => {
                tracing::info!("Balance of {}'s account requested", self.owner);
                Ok(ReturnValue::new(*balance))
            }
            _ => Err(no_such_method(BANK_ACCOUNT.name, method)),
        }
    }
}

// ==================== 通知 ====================

/// 取款守卫：记录每次取款尝试和失败
struct WithdrawalGuard;

#[async_trait]
impl MethodInterceptor for WithdrawalGuard {
    async fn invoke(&self, invocation: MethodInvocation<'_>) -> Result<ReturnValue> {
        let amount = invocation.arguments().get::<u64>(0).copied().unwrap_or_default();
        tracing::info!("🛡️ Guard: withdrawal of {} requested", amount);

        let result = invocation.proceed().await;
        if let Err(e) = &result {
            tracing::warn!("🛡️ Guard: withdrawal rejected: {}", e);
        }
        result
    }
}

/// 大额取款审计（运行时匹配）
struct LargeWithdrawalAudit;

#[async_trait]
impl BeforeAdvice for LargeWithdrawalAudit {
    async fn before(&self, join_point: &JoinPoint) -> Result<()> {
        let proxied = AopContext::current_proxy().is_some();
        tracing::info!(
            "📋 Audit: large withdrawal {:?} via {} (proxy exposed: {})",
            join_point.get_arg::<u64>(0),
            join_point,
            proxied
        );
        Ok(())
    }
}

fn load_settings() -> anyhow::Result<ProxySettings> {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/application.toml");
    let settings = match ProxySettings::from_file(path) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Using default proxy settings: {}", e);
            ProxySettings::default()
        }
    };
    Ok(settings.with_env_overrides()?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let settings = load_settings()?;
    tracing::info!("Proxy settings: {:?}", settings);

    // 对象池目标源：每次调用借出一个账户，调用结束后归还
    let pool = Arc::new(PoolingTargetSource::new(Some(BANK_ACCOUNT), 2, || {
        Ok(Arc::new(BankAccount::new("alice", 100)) as Arc<dyn Target>)
    })?);

    let mut config = ProxyConfig::with_target_source(pool.clone());
    config.add_interface(TypeDescriptor::interface("Account"))?;
    config.add_advisor(Arc::new(
        DefaultAdvisor::new(Advice::around(TraceInterceptor::new().with_args()))
            .with_name("logging")
            .with_order(1),
    ))?;
    config.add_advisor(Arc::new(
        DefaultPointcutAdvisor::for_methods(["withdraw"], Advice::around(WithdrawalGuard))
            .with_name("withdrawal-guard")
            .with_order(2),
    ))?;
    config.add_advisor(Arc::new(
        DefaultPointcutAdvisor::new(
            Arc::new(ComposablePointcut::from_method_matcher(Arc::new(ArgumentMethodMatcher::new(
                "withdraw",
                |args: &Arguments| args.get::<u64>(0).is_some_and(|amount| *amount >= 50),
            )))),
            Advice::before(LargeWithdrawalAudit),
        )
        .with_order(3),
    ))?;
    config.add_advice(Advice::around(PerformanceMonitorInterceptor::new(Duration::from_millis(50))))?;
    config.add_advice(Advice::after_throwing(ExceptionLoggingAdvice))?;
    config.sort_advisors()?;
    // 冻结标志最后写入
    settings.apply(&mut config);

    let proxy = create_proxy(config)?;
    tracing::info!("Created {:?} proxy exposing {:?}", proxy.strategy(), proxy.exposed_types());

    let balance = proxy.call(&DEPOSIT, args![25u64]).await?;
    tracing::info!("Balance after deposit: {:?}", balance.downcast_ref::<u64>());

    let balance = proxy.call(&WITHDRAW, args![10u64]).await?;
    tracing::info!("Balance after small withdrawal: {:?}", balance.downcast_ref::<u64>());

    match proxy.call(&WITHDRAW, args![1000u64]).await {
        Ok(_) => tracing::error!("Withdrawal of 1000 unexpectedly succeeded"),
        Err(e) => match e.downcast_ref::<InsufficientFunds>() {
            Some(insufficient) => tracing::info!(
                "Caller received InsufficientFunds unchanged (balance {}, requested {})",
                insufficient.balance,
                insufficient.requested
            ),
            None => return Err(e),
        },
    }

    let balance = proxy.call(&BALANCE, args![]).await?;
    tracing::info!(
        "Final balance: {:?} (pool: {} active, {} idle)",
        balance.downcast_ref::<u64>(),
        pool.active_count(),
        pool.idle_count()
    );

    Ok(())
}
