use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::{json, Value};

use recordql::config::SchemaConfig;
use recordql::sql::SqlRenderer;
use recordql::{
    apply_search, compile, ExecOptions, FieldType, ModelRegistry, Schema, SchemaField,
};

/// 加载 Schema, 优先使用JSON配置文件, 失败时退回内置演示 Schema
fn load_schema() -> Result<Schema> {
    match SchemaConfig::from_json_file("schema.json") {
        Ok(config) => {
            println!("✅ 成功从 schema.json 加载 Schema 配置");
            Ok(config.into_schema()?)
        }
        Err(e) => {
            println!("⚠️ 无法加载JSON配置文件 ({}), 使用内置演示 Schema", e);
            Ok(Schema::builder(demo_registry(), "book")
                .saved_query("Well rated", "rating >= 4")
                .build()?)
        }
    }
}

/// 内置演示实体: 书籍/作者/国家
fn demo_registry() -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    registry.add_model(
        "book",
        vec![
            SchemaField::new("name", FieldType::Str),
            SchemaField::new("rating", FieldType::Num),
            SchemaField::new("is_published", FieldType::Bool),
            SchemaField::new("written", FieldType::Date),
            SchemaField::new("author", FieldType::Relation("person".to_string())),
        ],
    );
    registry.add_model(
        "person",
        vec![
            SchemaField::new("name", FieldType::Str),
            SchemaField::new("country", FieldType::Relation("country".to_string())),
        ],
    );
    registry.add_model("country", vec![SchemaField::new("code", FieldType::Str)]);
    registry
}

fn demo_records() -> Vec<Value> {
    vec![
        json!({
            "name": "The Hobbit",
            "rating": 4.7,
            "is_published": true,
            "written": "1937-09-21",
            "author": {"name": "J. R. R. Tolkien", "country": {"code": "GB"}},
        }),
        json!({
            "name": "The Silmarillion",
            "rating": 4.1,
            "is_published": true,
            "written": "1977-09-15",
            "author": {"name": "J. R. R. Tolkien", "country": {"code": "GB"}},
        }),
        json!({
            "name": "Unfinished draft",
            "rating": 2.0,
            "is_published": false,
            "written": "2001-01-01",
            "author": null,
        }),
    ]
}

/// 编译一条查询并展示流水线每一步的产物
fn run_query(schema: &Schema, records: &[Value], line: &str) {
    // 1. 词法 + 语法 + 校验 + 翻译
    let filter = match compile(schema, line) {
        Ok(filter) => filter,
        Err(e) => {
            println!("✗ 查询无效: {}", e);
            return;
        }
    };

    println!("\n[抽象过滤器]:");
    match serde_json::to_string_pretty(&filter) {
        Ok(text) => println!("{}", text),
        Err(e) => println!("✗ 过滤器序列化失败: {}", e),
    }

    // 2. SQL 渲染
    let renderer = SqlRenderer::new(schema.current_model());
    match renderer.render(&filter) {
        Ok(sql) => println!("\n[生成的 SQL]:\n{}", sql),
        Err(e) => println!("✗ SQL 渲染失败: {}", e),
    }

    // 3. 在内存记录集上执行
    match apply_search(schema, line, records, &ExecOptions::default()) {
        Ok(found) => {
            println!("\n[匹配的记录]: {} / {}", found.len(), records.len());
            for record in &found {
                if let Some(name) = record.get("name").and_then(Value::as_str) {
                    println!("  • {}", name);
                }
            }
        }
        Err(e) => println!("✗ 执行失败: {}", e),
    }
}

fn main() -> Result<()> {
    println!("--- recordql: 记录集合查询语言 ---");

    let schema = load_schema()?;
    let records = demo_records();

    println!("\n[Schema 信息]:");
    println!("当前实体: {}", schema.current_model());
    println!(
        "暴露的实体: {}",
        schema.model_names().collect::<Vec<_>>().join(", ")
    );
    for (label, text) in schema.saved_queries_for(None) {
        println!("保存的查询: {} → {}", label, text);
    }

    println!("\n输入查询 (空行匹配全部记录, exit 退出):");
    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("recordql> ") {
            Ok(line) => {
                let line = line.trim();
                if line == "exit" || line == "quit" {
                    break;
                }
                editor.add_history_entry(line)?;
                run_query(&schema, &records, line);
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                println!("✗ 读取输入失败: {}", e);
                break;
            }
        }
    }

    Ok(())
}
