//! 配置模块, 从JSON文件加载 Schema 定义
//!
//! 配置文件描述实体、字段类型、关系目标和可选的 include/exclude 列表,
//! 对应没有宿主自省可用时的静态 Schema 来源。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::schema::{FieldType, ModelRegistry, Schema, SchemaField};

/// Schema 配置错误
#[derive(Debug, Clone, PartialEq, Error)]
#[error("配置错误: {message}")]
pub struct ConfigError {
    pub message: String,
}

impl ConfigError {
    pub fn new(message: String) -> Self {
        Self { message }
    }
}

/// 单个字段的配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    /// 类型标签: str / num / bool / date / datetime / relation
    #[serde(rename = "type")]
    pub field_type: String,
    /// 关系字段的目标实体, 仅 type = "relation" 时有效
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    /// 底层存储路径别名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup: Option<String>,
}

/// Schema 配置结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// 查询路径的出发实体
    pub current_model: String,
    /// 实体名 → 字段名 → 字段配置
    pub models: BTreeMap<String, BTreeMap<String, FieldConfig>>,
    /// 只暴露这些实体 (与 exclude 互斥)
    #[serde(default)]
    pub include: Vec<String>,
    /// 暴露除这些之外的全部实体 (与 include 互斥)
    #[serde(default)]
    pub exclude: Vec<String>,
    /// 静态保存查询: 标签 → 查询文本
    #[serde(default)]
    pub saved_queries: BTreeMap<String, String>,
}

impl SchemaConfig {
    /// 从JSON文件加载 Schema 配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        // 检查文件是否存在
        if !path_ref.exists() {
            return Err(ConfigError::new(format!(
                "配置文件不存在: {}",
                path_ref.display()
            )));
        }

        // 读取文件内容
        let content = fs::read_to_string(path_ref).map_err(|e| {
            ConfigError::new(format!("无法读取配置文件 {}: {}", path_ref.display(), e))
        })?;

        // 解析JSON
        serde_json::from_str(&content).map_err(|e| {
            ConfigError::new(format!(
                "无法解析JSON配置文件 {}: {}",
                path_ref.display(),
                e
            ))
        })
    }

    /// 把配置转换成可用的 Schema
    pub fn into_schema(self) -> Result<Schema, ConfigError> {
        let mut registry = ModelRegistry::new();
        for (model, fields) in &self.models {
            let mut defs = Vec::with_capacity(fields.len());
            for (name, config) in fields {
                let field_type = config.resolve_type(model, name)?;
                defs.push(match &config.lookup {
                    Some(lookup) => SchemaField::with_lookup(name, field_type, lookup),
                    None => SchemaField::new(name, field_type),
                });
            }
            registry.add_model(model, defs);
        }

        let mut builder = Schema::builder(registry, self.current_model);
        if !self.include.is_empty() {
            builder = builder.include(self.include);
        }
        if !self.exclude.is_empty() {
            builder = builder.exclude(self.exclude);
        }
        for (label, text) in self.saved_queries {
            builder = builder.saved_query(label, text);
        }
        builder
            .build()
            .map_err(|e| ConfigError::new(e.to_string()))
    }
}

impl FieldConfig {
    fn resolve_type(&self, model: &str, field: &str) -> Result<FieldType, ConfigError> {
        match self.field_type.as_str() {
            "str" => Ok(FieldType::Str),
            "num" => Ok(FieldType::Num),
            "bool" => Ok(FieldType::Bool),
            "date" => Ok(FieldType::Date),
            "datetime" => Ok(FieldType::DateTime),
            "relation" => match &self.relation {
                Some(target) => Ok(FieldType::Relation(target.clone())),
                // 关系字段必须声明目标实体
                None => Err(ConfigError::new(format!(
                    "字段 {}.{} 是关系类型但缺少 relation 目标",
                    model, field
                ))),
            },
            other => Err(ConfigError::new(format!(
                "字段 {}.{} 的类型标签未知: {}",
                model, field, other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;

    fn write_temp(name: &str, content: &str) {
        let mut file = fs::File::create(name).unwrap();
        writeln!(file, "{}", content).unwrap();
    }

    #[test]
    fn test_load_valid_schema_config() {
        // 创建临时配置文件
        let temp_file = "test_schema_config.json";
        write_temp(
            temp_file,
            r#"{
                "current_model": "book",
                "models": {
                    "book": {
                        "name": {"type": "str"},
                        "rating": {"type": "num"},
                        "author": {"type": "relation", "relation": "person"},
                        "written_in_year": {"type": "num", "lookup": "written.year"}
                    },
                    "person": {
                        "name": {"type": "str"}
                    }
                },
                "saved_queries": {"Good ones": "rating >= 4"}
            }"#,
        );

        // 测试加载与转换
        let schema = SchemaConfig::from_json_file(temp_file)
            .unwrap()
            .into_schema()
            .unwrap();
        assert_eq!(schema.current_model(), "book");
        assert!(schema.has_model("person"));
        let resolved = schema
            .resolve("book", &["written_in_year".to_string()])
            .unwrap();
        assert_eq!(resolved.lookup_parts(), vec!["written", "year"]);
        assert_eq!(schema.saved_queries_for(None)["Good ones"], "rating >= 4");

        // 清理
        fs::remove_file(temp_file).ok();
    }

    #[test]
    fn test_invalid_json_config() {
        let temp_file = "test_invalid_schema.json";
        write_temp(temp_file, "invalid json");

        let result = SchemaConfig::from_json_file(temp_file);
        assert!(result.is_err());

        // 清理
        fs::remove_file(temp_file).ok();
    }

    #[test]
    fn test_missing_file() {
        let result = SchemaConfig::from_json_file("non_existent_schema.json");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_type_tag() {
        let config: SchemaConfig = serde_json::from_str(
            r#"{
                "current_model": "book",
                "models": {"book": {"name": {"type": "varchar"}}}
            }"#,
        )
        .unwrap();
        let err = config.into_schema().unwrap_err();
        assert!(err.message.contains("varchar"), "{}", err);
    }

    #[test]
    fn test_relation_requires_target() {
        let config: SchemaConfig = serde_json::from_str(
            r#"{
                "current_model": "book",
                "models": {"book": {"author": {"type": "relation"}}}
            }"#,
        )
        .unwrap();
        assert!(config.into_schema().is_err());
    }

    #[test]
    fn test_include_exclude_conflict_surfaces() {
        let config: SchemaConfig = serde_json::from_str(
            r#"{
                "current_model": "book",
                "models": {"book": {"name": {"type": "str"}}},
                "include": ["book"],
                "exclude": ["person"]
            }"#,
        )
        .unwrap();
        assert!(config.into_schema().is_err());
    }
}
