//! 代理设置
//!
//! 从 TOML 读取代理策略标志，环境变量可以覆盖文件中的值：
//!
//! ```toml
//! [aop.proxy]
//! target-class = true
//! expose-proxy = false
//! ```
//!
//! 对应的环境变量为 `CHIMERA_AOP_PROXY_TARGET_CLASS`、`CHIMERA_AOP_PROXY_EXPOSE_PROXY` 等。

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::config::ProxyConfig;
use crate::error::{AopError, AopResult};

/// 环境变量前缀
pub const ENV_PREFIX: &str = "CHIMERA_";

const KEY_PREFIX: &str = "aop.proxy.";

/// 代理策略设置
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProxySettings {
    /// 强制子类代理
    #[serde(rename = "target-class")]
    pub proxy_target_class: bool,
    pub optimize: bool,
    pub opaque: bool,
    pub expose_proxy: bool,
    pub frozen: bool,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    aop: AopSection,
}

#[derive(Debug, Default, Deserialize)]
struct AopSection {
    #[serde(default)]
    proxy: ProxySettings,
}

impl ProxySettings {
    /// 从 TOML 字符串解析，缺少 `[aop.proxy]` 段时使用默认值
    pub fn from_toml_str(content: &str) -> AopResult<Self> {
        let file: SettingsFile = toml::from_str(content)
            .map_err(|e| AopError::configuration(format!("Invalid proxy settings: {}", e)))?;
        Ok(file.aop.proxy)
    }

    /// 从 TOML 文件加载
    pub fn from_file(path: impl AsRef<Path>) -> AopResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AopError::configuration(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        tracing::debug!(path = %path.display(), "Loading proxy settings");
        Self::from_toml_str(&content)
    }

    /// 用进程环境变量覆盖
    pub fn with_env_overrides(self) -> AopResult<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// 用任意键值来源覆盖，`lookup` 接收环境变量名
    pub fn with_overrides<F>(mut self, lookup: F) -> AopResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let fields: [(&str, &mut bool); 5] = [
            ("target-class", &mut self.proxy_target_class),
            ("optimize", &mut self.optimize),
            ("opaque", &mut self.opaque),
            ("expose-proxy", &mut self.expose_proxy),
            ("frozen", &mut self.frozen),
        ];

        for (key, slot) in fields {
            let env_key = key_to_env(key);
            if let Some(raw) = lookup(&env_key) {
                *slot = parse_bool(&env_key, &raw)?;
                tracing::debug!(key = %env_key, value = *slot, "Proxy setting overridden from environment");
            }
        }
        Ok(self)
    }

    /// 把设置写入代理配置
    pub fn apply(&self, config: &mut ProxyConfig) {
        config.set_proxy_target_class(self.proxy_target_class);
        config.set_optimize(self.optimize);
        config.set_opaque(self.opaque);
        config.set_expose_proxy(self.expose_proxy);
        config.set_frozen(self.frozen);
    }
}

/// 配置键转换为环境变量名
/// 例如: target-class -> CHIMERA_AOP_PROXY_TARGET_CLASS
fn key_to_env(key: &str) -> String {
    format!("{}{}{}", ENV_PREFIX, KEY_PREFIX, key)
        .replace(['.', '-'], "_")
        .to_uppercase()
}

fn parse_bool(key: &str, raw: &str) -> AopResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(AopError::configuration(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_proxy_section() {
        let settings = ProxySettings::from_toml_str(
            r#"
            [server]
            port = 8080

            [aop.proxy]
            target-class = true
            expose-proxy = true
            "#,
        );
        // 未知的顶层段落不影响解析
        let settings = settings.unwrap();
        assert!(settings.proxy_target_class);
        assert!(settings.expose_proxy);
        assert!(!settings.optimize);
    }

    #[test]
    fn test_missing_section_uses_defaults() {
        assert_eq!(ProxySettings::from_toml_str("").unwrap(), ProxySettings::default());
    }

    #[test]
    fn test_unknown_proxy_key_is_rejected() {
        let err = ProxySettings::from_toml_str("[aop.proxy]\ntarget_class = true\n").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_env_key_naming() {
        assert_eq!(key_to_env("target-class"), "CHIMERA_AOP_PROXY_TARGET_CLASS");
        assert_eq!(key_to_env("expose-proxy"), "CHIMERA_AOP_PROXY_EXPOSE_PROXY");
    }

    #[test]
    fn test_overrides_win_over_file() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("CHIMERA_AOP_PROXY_TARGET_CLASS", "false"),
            ("CHIMERA_AOP_PROXY_OPAQUE", "yes"),
        ]);
        let settings = ProxySettings::from_toml_str("[aop.proxy]\ntarget-class = true\n")
            .unwrap()
            .with_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert!(!settings.proxy_target_class);
        assert!(settings.opaque);
    }

    #[test]
    fn test_bad_override_is_a_configuration_error() {
        let err = ProxySettings::default()
            .with_overrides(|key| (key == "CHIMERA_AOP_PROXY_OPTIMIZE").then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("CHIMERA_AOP_PROXY_OPTIMIZE"));
    }

    #[test]
    fn test_apply_sets_flags() {
        let settings = ProxySettings {
            proxy_target_class: true,
            expose_proxy: true,
            ..Default::default()
        };
        let mut config = ProxyConfig::new();
        settings.apply(&mut config);

        assert!(config.is_proxy_target_class());
        assert!(config.is_expose_proxy());
        assert!(!config.is_frozen());
    }
}
