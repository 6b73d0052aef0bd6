use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::hint::black_box;

use recordql::lexer::Lexer;
use recordql::parser::Parser;
use recordql::schema::{FieldType, ModelRegistry, Schema, SchemaField};
use recordql::{compile, exec, ExecOptions};

// 基准测试共用的 Schema: 书籍/作者/国家
fn bench_schema() -> Schema {
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
    Schema::new(registry, "book").unwrap()
}

fn test_cases() -> Vec<(&'static str, &'static str)> {
    vec![
        ("simple", r#"name = "The Hobbit""#),
        (
            "medium",
            r#"rating >= 4 and is_published = true and author.name ~ "Tolkien""#,
        ),
        (
            "complex",
            r#"(rating >= 4 or rating < 1) and not author.country.code in ["US", "CA", "MX"] and written > "1950-01-01" and name !~ "draft""#,
        ),
    ]
}

// 基准测试: 词法分析性能
fn benchmark_lexer(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer_performance");

    for (name, query) in test_cases() {
        group.bench_with_input(BenchmarkId::new("tokenize", name), &query, |b, &query| {
            b.iter(|| {
                let tokens = Lexer::tokenize(black_box(query)).unwrap();
                black_box(tokens)
            })
        });
    }

    group.finish();
}

// 基准测试: 语法分析性能
fn benchmark_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser_performance");

    for (name, query) in test_cases() {
        // 预先词法分析
        let tokens = Lexer::tokenize(query).unwrap();

        group.bench_with_input(BenchmarkId::new("parse", name), &tokens, |b, tokens| {
            b.iter(|| {
                let ast = Parser::new(black_box(tokens)).parse().unwrap();
                black_box(ast)
            })
        });
    }

    group.finish();
}

// 基准测试: 完整编译流水线 (词法 → 语法 → 校验 → 翻译)
fn benchmark_compile(c: &mut Criterion) {
    let schema = bench_schema();
    let mut group = c.benchmark_group("compile_performance");

    for (name, query) in test_cases() {
        group.bench_with_input(BenchmarkId::new("compile", name), &query, |b, &query| {
            b.iter(|| {
                let filter = compile(&schema, black_box(query)).unwrap();
                black_box(filter)
            })
        });
    }

    group.finish();
}

// 基准测试: 在内存记录集上执行过滤器
fn benchmark_exec(c: &mut Criterion) {
    let schema = bench_schema();
    let options = ExecOptions::default();

    // 构造一批有区分度的记录
    let records: Vec<_> = (0..1000)
        .map(|i| {
            json!({
                "name": format!("Book {}", i),
                "rating": (i % 50) as f64 / 10.0,
                "is_published": i % 3 != 0,
                "written": "1990-05-01",
                "author": {
                    "name": if i % 7 == 0 { "J. R. R. Tolkien" } else { "Somebody Else" },
                    "country": {"code": if i % 2 == 0 { "GB" } else { "US" }},
                },
            })
        })
        .collect();

    let mut group = c.benchmark_group("exec_performance");
    group.throughput(criterion::Throughput::Elements(records.len() as u64));

    for (name, query) in test_cases() {
        let filter = compile(&schema, query).unwrap();
        group.bench_with_input(BenchmarkId::new("apply", name), &filter, |b, filter| {
            b.iter(|| {
                let found = exec::apply(black_box(filter), &records, &options);
                black_box(found)
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_lexer,
    benchmark_parser,
    benchmark_compile,
    benchmark_exec
);
criterion_main!(benches);
