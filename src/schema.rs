//! Schema: 描述哪些实体、字段和关系可以被查询, 以及字段的值类型
//!
//! Schema 针对一个"当前实体"构造, 输入是宿主生态自省得到的实体元数据
//! ([`ModelRegistry`])。暴露的实体集合由 include 或 exclude 列表控制
//! (二者互斥), 当前实体必须始终在暴露集合内。
//!
//! 字段解析 ([`Schema::resolve`]) 逐段惰性进行, 遍历深度以查询给出的
//! 路径长度为界, 因此关系图中的环不会导致无限遍历。

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{json, Map, Value as Json};
use thiserror::Error;

/// 字段的值类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Str,
    Num,
    Bool,
    Date,
    DateTime,
    /// 关系字段, 携带目标实体的标识符
    Relation(String),
}

impl FieldType {
    /// `as_dict` 序列化使用的类型标签
    pub fn tag(&self) -> &'static str {
        match self {
            FieldType::Str => "str",
            FieldType::Num => "num",
            FieldType::Bool => "bool",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::Relation(_) => "relation",
        }
    }
}

/// Schema 中的一个字段定义
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaField {
    pub name: String,
    pub field_type: FieldType,
    /// 底层存储路径别名; `None` 时公开名字即存储名字
    pub lookup: Option<String>,
}

impl SchemaField {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            lookup: None,
        }
    }

    /// 公开名字与底层存储路径不同的字段 (字段重命名/别名)
    pub fn with_lookup(
        name: impl Into<String>,
        field_type: FieldType,
        lookup: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            field_type,
            lookup: Some(lookup.into()),
        }
    }

    /// 翻译阶段使用的存储路径片段
    pub fn lookup_parts(&self) -> Vec<String> {
        self.lookup
            .as_deref()
            .unwrap_or(&self.name)
            .split('.')
            .map(str::to_string)
            .collect()
    }
}

/// 一个实体的字段集合, 保持调用方给出的顺序, 名字查找为 O(log n)
#[derive(Debug, Clone, Default)]
pub struct ModelDef {
    fields: Vec<SchemaField>,
    index: BTreeMap<String, usize>,
}

impl ModelDef {
    pub fn new(fields: Vec<SchemaField>) -> Self {
        let mut index = BTreeMap::new();
        for (i, field) in fields.iter().enumerate() {
            index.insert(field.name.clone(), i);
        }
        Self { fields, index }
    }

    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }
}

/// 宿主生态自省得到的实体元数据, 即 Schema 构造的输入
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, ModelDef>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_model(&mut self, name: impl Into<String>, fields: Vec<SchemaField>) -> &mut Self {
        self.models.insert(name.into(), ModelDef::new(fields));
        self
    }

    pub fn model(&self, name: &str) -> Option<&ModelDef> {
        self.models.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }
}

/// Schema 构造错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaConfigError {
    #[error("include and exclude cannot be used together")]
    IncludeExcludeConflict,
    #[error("current model '{0}' is excluded from the schema")]
    CurrentModelExcluded(String),
    #[error("'{0}' is not a known model identifier")]
    UnknownModel(String),
}

/// 字段路径解析错误, 携带出错片段的名字
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldResolutionError {
    #[error("Unknown field: {name}")]
    UnknownField { model: String, name: String },
    #[error("Unknown model: {name}")]
    UnknownModel { name: String },
    #[error("Field '{field}' is not a relation, can't resolve '{segment}' after it")]
    NotRelation { field: String, segment: String },
    #[error("Empty field path")]
    EmptyPath,
}

/// 解析路径中的一步: 在哪个实体上命中了哪个字段
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStep {
    pub model: String,
    pub field: SchemaField,
}

/// 解析后的字段路径, 终点是用于字面量类型检查的字段
///
/// 由 [`Schema::resolve`] 构造, 保证至少包含一步。
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPath {
    steps: Vec<ResolvedStep>,
}

impl ResolvedPath {
    pub fn steps(&self) -> &[ResolvedStep] {
        &self.steps
    }

    /// 终点字段, 其类型决定允许的字面量和运算符
    pub fn terminal(&self) -> &SchemaField {
        &self.steps[self.steps.len() - 1].field
    }

    /// 终点字段的值类型
    pub fn terminal_type(&self) -> &FieldType {
        &self.terminal().field_type
    }

    /// 展开别名后的存储路径片段, 供翻译器使用
    pub fn lookup_parts(&self) -> Vec<String> {
        self.steps
            .iter()
            .flat_map(|step| step.field.lookup_parts())
            .collect()
    }
}

/// 保存的查询: 标签 + 查询文本, 纯描述性数据
#[derive(Debug, Clone, PartialEq)]
pub struct SavedQuery {
    pub label: String,
    pub text: String,
}

impl SavedQuery {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }
}

/// 注入的保存查询提供者: (当前实体, 用户) → 查询列表
pub type SavedQueryFn = dyn Fn(&str, Option<&str>) -> Vec<SavedQuery> + Send + Sync;

/// 针对一个当前实体构造完成的 Schema
pub struct Schema {
    current: String,
    models: BTreeMap<String, ModelDef>,
    saved: Vec<SavedQuery>,
    saved_source: Option<Box<SavedQueryFn>>,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("current", &self.current)
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .field("saved", &self.saved)
            .finish_non_exhaustive()
    }
}

impl Schema {
    pub fn builder(registry: ModelRegistry, current: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            registry,
            current: current.into(),
            include: Vec::new(),
            exclude: Vec::new(),
            overrides: BTreeMap::new(),
            saved: Vec::new(),
            saved_source: None,
        }
    }

    /// 只用自省元数据、不加任何限制的 Schema
    pub fn new(registry: ModelRegistry, current: impl Into<String>) -> Result<Self, SchemaConfigError> {
        Self::builder(registry, current).build()
    }

    pub fn current_model(&self) -> &str {
        &self.current
    }

    pub fn has_model(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    /// 实体暴露的字段。指向未暴露实体的关系字段被过滤掉,
    /// 保证 `as_dict` 与 `resolve` 接受的字段永远一致
    pub fn fields_of(&self, model: &str) -> Option<Vec<&SchemaField>> {
        let def = self.models.get(model)?;
        Some(
            def.fields()
                .iter()
                .filter(|f| self.is_exposed(f))
                .collect(),
        )
    }

    fn is_exposed(&self, field: &SchemaField) -> bool {
        match &field.field_type {
            FieldType::Relation(target) => self.models.contains_key(target),
            _ => true,
        }
    }

    fn exposed_field(&self, model: &str, name: &str) -> Option<&SchemaField> {
        self.models
            .get(model)?
            .field(name)
            .filter(|f| self.is_exposed(f))
    }

    /// 逐段解析字段路径: 每个非末段必须是关系字段, 移动到目标实体后
    /// 消费下一段; 末段可以是标量字段, 也可以停在关系字段上
    /// (关系字段只能与 None 比较)
    pub fn resolve(&self, model: &str, path: &[String]) -> Result<ResolvedPath, FieldResolutionError> {
        if !self.models.contains_key(model) {
            return Err(FieldResolutionError::UnknownModel {
                name: model.to_string(),
            });
        }
        if path.is_empty() {
            return Err(FieldResolutionError::EmptyPath);
        }

        let mut steps = Vec::with_capacity(path.len());
        let mut current_model = model.to_string();
        for (i, segment) in path.iter().enumerate() {
            let field = self.exposed_field(&current_model, segment).ok_or_else(|| {
                FieldResolutionError::UnknownField {
                    model: current_model.clone(),
                    name: segment.clone(),
                }
            })?;
            let is_last = i + 1 == path.len();
            match &field.field_type {
                FieldType::Relation(target) => {
                    let target = target.clone();
                    steps.push(ResolvedStep {
                        model: current_model.clone(),
                        field: field.clone(),
                    });
                    if !is_last {
                        current_model = target;
                    }
                }
                _ => {
                    steps.push(ResolvedStep {
                        model: current_model.clone(),
                        field: field.clone(),
                    });
                    if !is_last {
                        return Err(FieldResolutionError::NotRelation {
                            field: segment.clone(),
                            segment: path[i + 1].clone(),
                        });
                    }
                }
            }
        }
        Ok(ResolvedPath { steps })
    }

    /// 当前实体可见的保存查询, 标签唯一 (后注册的覆盖先注册的)
    pub fn saved_queries_for(&self, user: Option<&str>) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        for query in &self.saved {
            out.insert(query.label.clone(), query.text.clone());
        }
        if let Some(source) = &self.saved_source {
            for query in source(&self.current, user) {
                out.insert(query.label, query.text);
            }
        }
        out
    }

    /// 把暴露的实体/字段图加上保存查询序列化为传输格式,
    /// 供外部展示层 (自动补全等) 消费
    pub fn as_dict(&self, user: Option<&str>) -> Json {
        let mut models = Map::new();
        for name in self.models.keys() {
            let mut fields = Map::new();
            if let Some(model_fields) = self.fields_of(name) {
                for field in model_fields {
                    let mut descr = Map::new();
                    descr.insert("type".to_string(), json!(field.field_type.tag()));
                    if let FieldType::Relation(target) = &field.field_type {
                        descr.insert("relation".to_string(), json!(target));
                    }
                    fields.insert(field.name.clone(), Json::Object(descr));
                }
            }
            models.insert(name.clone(), Json::Object(fields));
        }

        let mut saved = Map::new();
        for (label, text) in self.saved_queries_for(user) {
            saved.insert(label, json!({ "q": text }));
        }

        json!({
            "current_model": self.current,
            "models": models,
            "saved_queries": saved,
        })
    }
}

/// Schema 的构造器, 收集 include/exclude、字段覆盖和保存查询
pub struct SchemaBuilder {
    registry: ModelRegistry,
    current: String,
    include: Vec<String>,
    exclude: Vec<String>,
    overrides: BTreeMap<String, Vec<SchemaField>>,
    saved: Vec<SavedQuery>,
    saved_source: Option<Box<SavedQueryFn>>,
}

impl SchemaBuilder {
    /// 只暴露给出的实体 (与 exclude 互斥)
    pub fn include<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include.extend(models.into_iter().map(Into::into));
        self
    }

    /// 暴露除给出实体之外的全部实体 (与 include 互斥)
    pub fn exclude<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(models.into_iter().map(Into::into));
        self
    }

    /// 覆盖一个实体暴露的字段 (fields_of 定制点)
    pub fn fields(mut self, model: impl Into<String>, fields: Vec<SchemaField>) -> Self {
        self.overrides.insert(model.into(), fields);
        self
    }

    /// 注册一条静态保存查询
    pub fn saved_query(mut self, label: impl Into<String>, text: impl Into<String>) -> Self {
        self.saved.push(SavedQuery::new(label, text));
        self
    }

    /// 注入动态的保存查询提供者 (saved_queries_for 定制点)
    pub fn saved_query_source<F>(mut self, source: F) -> Self
    where
        F: Fn(&str, Option<&str>) -> Vec<SavedQuery> + Send + Sync + 'static,
    {
        self.saved_source = Some(Box::new(source));
        self
    }

    pub fn build(self) -> Result<Schema, SchemaConfigError> {
        if !self.include.is_empty() && !self.exclude.is_empty() {
            return Err(SchemaConfigError::IncludeExcludeConflict);
        }
        // 当前实体必须是注册表已知的实体标识符
        if !self.registry.contains(&self.current) {
            return Err(SchemaConfigError::UnknownModel(self.current));
        }

        let mut models = BTreeMap::new();
        for (name, def) in &self.registry.models {
            let exposed = if !self.include.is_empty() {
                self.include.iter().any(|m| m == name)
            } else {
                !self.exclude.iter().any(|m| m == name)
            };
            if !exposed {
                continue;
            }
            match self.overrides.get(name) {
                Some(fields) => models.insert(name.clone(), ModelDef::new(fields.clone())),
                None => models.insert(name.clone(), def.clone()),
            };
        }

        if !models.contains_key(&self.current) {
            return Err(SchemaConfigError::CurrentModelExcluded(self.current));
        }

        Ok(Schema {
            current: self.current,
            models,
            saved: self.saved,
            saved_source: self.saved_source,
        })
    }
}

/// 测试共用的注册表: 书籍/人员/国家三个实体, 覆盖标量、关系、别名等情况
#[cfg(test)]
pub(crate) fn library_registry() -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    registry.add_model(
        "book",
        vec![
            SchemaField::new("name", FieldType::Str),
            SchemaField::new("rating", FieldType::Num),
            SchemaField::new("is_published", FieldType::Bool),
            SchemaField::new("written", FieldType::DateTime),
            SchemaField::new("author", FieldType::Relation("person".to_string())),
            SchemaField::with_lookup("written_in_year", FieldType::Num, "written.year"),
        ],
    );
    registry.add_model(
        "person",
        vec![
            SchemaField::new("name", FieldType::Str),
            SchemaField::new("country", FieldType::Relation("country".to_string())),
            // 自反关系: person → person, 解析必须仍然有界
            SchemaField::new("mentor", FieldType::Relation("person".to_string())),
        ],
    );
    registry.add_model(
        "country",
        vec![
            SchemaField::new("code", FieldType::Str),
            SchemaField::new("founded", FieldType::Date),
        ],
    );
    registry
}
