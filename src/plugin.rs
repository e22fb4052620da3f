//! 组件注册模块
//!
//! 宿主框架通过显式注册获得分析器组件，没有任何全局状态。

use crate::builder::AnalyzerFactory;
use crate::core::protocol::ConnectionId;
use crate::error::{AnalyzerError, Result};
use crate::stream::analyzer::XmppAnalyzer;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// 组件名称
pub const COMPONENT_NAME: &str = "XMPP";

/// 组件描述
pub const COMPONENT_DESCRIPTION: &str = "XMPP analyzer (StartTLS only)";

/// 分析器创建函数
pub type AnalyzerFactoryFn = Arc<dyn Fn(ConnectionId) -> XmppAnalyzer + Send + Sync>;

/// 可注册的分析器组件
#[derive(Clone)]
pub struct AnalyzerComponent {
    /// 组件名称
    pub name: String,
    /// 组件描述
    pub description: String,
    /// 创建函数
    pub factory: AnalyzerFactoryFn,
}

impl std::fmt::Debug for AnalyzerComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyzerComponent")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl AnalyzerComponent {
    /// 创建新组件
    pub fn new<N, D, F>(name: N, description: D, factory: F) -> Self
    where
        N: Into<String>,
        D: Into<String>,
        F: Fn(ConnectionId) -> XmppAnalyzer + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            factory: Arc::new(factory),
        }
    }
}

/// 注册结果，供宿主框架展示
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginConfiguration {
    /// 组件名称
    pub name: String,
    /// 组件描述
    pub description: String,
}

/// 分析器组件注册表
#[derive(Debug, Default)]
pub struct AnalyzerRegistry {
    components: HashMap<String, AnalyzerComponent>,
}

impl AnalyzerRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册组件，同名组件只能注册一次
    pub fn register(&mut self, component: AnalyzerComponent) -> Result<()> {
        if self.components.contains_key(&component.name) {
            return Err(AnalyzerError::duplicate_component(component.name));
        }
        debug!(name = %component.name, "analyzer component registered");
        self.components.insert(component.name.clone(), component);
        Ok(())
    }

    /// 为指定连接创建分析器
    pub fn instantiate(&self, name: &str, connection_id: ConnectionId) -> Result<XmppAnalyzer> {
        let component = self
            .components
            .get(name)
            .ok_or_else(|| AnalyzerError::unknown_component(name))?;
        Ok((component.factory)(connection_id))
    }

    /// 获取组件
    pub fn get(&self, name: &str) -> Option<&AnalyzerComponent> {
        self.components.get(name)
    }

    /// 是否已注册
    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    /// 已注册的组件名称（按字典序）
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.components.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// 组件数量
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// 注册XMPP分析器组件
pub fn configure(registry: &mut AnalyzerRegistry, factory: AnalyzerFactory) -> Result<PluginConfiguration> {
    registry.register(AnalyzerComponent::new(
        COMPONENT_NAME,
        COMPONENT_DESCRIPTION,
        move |connection_id| factory.instantiate(connection_id),
    ))?;

    Ok(PluginConfiguration {
        name: COMPONENT_NAME.to_string(),
        description: COMPONENT_DESCRIPTION.to_string(),
    })
}
