//! 类型、方法、参数与返回值的运行时描述
//!
//! Rust 没有运行时反射，代理引擎以静态描述符代替 `Class` / `Method` 对象

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use crate::error::AopError;

/// 代理标记接口，所有代理都实现它
pub const MANAGED_PROXY: &str = "chimera::ManagedProxy";

/// 配置自省接口（非 opaque 代理实现它）
pub const ADVISED: &str = "chimera::Advised";

/// 类型种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// 接口（trait），无法被“继承”
    Interface,
    /// 具体类型
    Class,
}

/// 类型描述符
///
/// 通常声明为常量：
/// ```ignore
/// const BANK_ACCOUNT: TypeDescriptor = TypeDescriptor::class("BankAccount").implementing(&["Account"]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    pub name: &'static str,
    pub kind: TypeKind,
    pub interfaces: &'static [&'static str],
}

impl TypeDescriptor {
    pub const fn class(name: &'static str) -> Self {
        Self {
            name,
            kind: TypeKind::Class,
            interfaces: &[],
        }
    }

    pub const fn interface(name: &'static str) -> Self {
        Self {
            name,
            kind: TypeKind::Interface,
            interfaces: &[],
        }
    }

    pub const fn implementing(mut self, interfaces: &'static [&'static str]) -> Self {
        self.interfaces = interfaces;
        self
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    /// 匹配时使用的类型：目标类型未知时退化为方法的声明接口
    pub fn effective(target_class: Option<TypeDescriptor>, method: &Method) -> TypeDescriptor {
        target_class.unwrap_or_else(|| TypeDescriptor::interface(method.declaring_type))
    }

    /// 是否可以赋值给指定类型（自身或实现的接口）
    pub fn is_assignable_to(&self, type_name: &str) -> bool {
        self.name == type_name || self.interfaces.contains(&type_name)
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 方法签名
///
/// 与目标类型名一起构成静态匹配缓存的键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Method {
    pub declaring_type: &'static str,
    pub name: &'static str,
    pub param_types: &'static [&'static str],
}

impl Method {
    pub const fn new(declaring_type: &'static str, name: &'static str) -> Self {
        Self {
            declaring_type,
            name,
            param_types: &[],
        }
    }

    pub const fn with_params(mut self, param_types: &'static [&'static str]) -> Self {
        self.param_types = param_types;
        self
    }

    /// 完整签名，例如 `Account::withdraw(u64)`
    pub fn signature(&self) -> String {
        format!(
            "{}::{}({})",
            self.declaring_type,
            self.name,
            self.param_types.join(", ")
        )
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.declaring_type, self.name)
    }
}

type ArgValue = Arc<dyn Any + Send + Sync>;

/// 方法参数
///
/// 克隆只复制引用计数
#[derive(Clone, Default)]
pub struct Arguments {
    values: Vec<ArgValue>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<T: Any + Send + Sync>(&mut self, value: T) {
        self.values.push(Arc::new(value));
    }

    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.push(value);
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 按类型读取第 `index` 个参数
    pub fn get<T: Any>(&self, index: usize) -> Option<&T> {
        self.values.get(index)?.downcast_ref::<T>()
    }

    /// 读取参数，缺失或类型不符时返回 [`AopError::InvalidArgument`]
    pub fn require<T: Any>(&self, method: &Method, index: usize) -> Result<&T, AopError> {
        self.get::<T>(index).ok_or_else(|| AopError::InvalidArgument {
            method: method.to_string(),
            index,
            expected: type_name::<T>(),
        })
    }

    /// 替换第 `index` 个参数，越界时返回 false
    pub fn set<T: Any + Send + Sync>(&mut self, index: usize, value: T) -> bool {
        match self.values.get_mut(index) {
            Some(slot) => {
                *slot = Arc::new(value);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arguments")
            .field("len", &self.values.len())
            .finish()
    }
}

/// 方法返回值
pub struct ReturnValue(Box<dyn Any + Send + Sync>);

impl ReturnValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Box::new(value))
    }

    /// `()` 返回值
    pub fn unit() -> Self {
        Self::new(())
    }

    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// 取出具体值，类型不符时原样返回
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        match self.0.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(original) => Err(Self(original)),
        }
    }
}

impl fmt::Debug for ReturnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReturnValue").finish_non_exhaustive()
    }
}

/// 构造 [`Arguments`]
///
/// ```ignore
/// proxy.call(&WITHDRAW, args![1000u64]).await?;
/// ```
#[macro_export]
macro_rules! args {
    () => {
        $crate::Arguments::new()
    };
    ($($value:expr),+ $(,)?) => {
        {
            let mut arguments = $crate::Arguments::new();
            $(arguments.push($value);)+
            arguments
        }
    };
}
