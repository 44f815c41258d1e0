use criterion::{black_box, criterion_group, criterion_main, Criterion};

use htmacro::script::{eval_expr, interpolate, parse_expr, EvalContext, Value};
use htmacro::Engine;

struct Vars;

impl EvalContext for Vars {
    fn get_var(&self, name: &str) -> Option<Value> {
        match name {
            "x" => Some(Value::Int(4)),
            "y" => Some(Value::Float(6.5)),
            "title" => Some(Value::Str("Home".into())),
            _ => None,
        }
    }
    fn warn(&mut self, _: String) {}
}

const EXPR: &str = "int(x * y) + max(1, 2, 3) * 2 > 10 && len(upper(title)) == 4";

fn make_page(items: usize) -> String {
    let mut src = String::from("<MACRO NAME=row n><tr><td>{n}</td><td>{n * n}</td></tr></MACRO><table>");
    src.push_str(&format!(
        "<FOR i=0 TRUE='i < {items}' i='i + 1'><row n=i/></FOR></table>"
    ));
    src
}

fn bench_expr(c: &mut Criterion) {
    let mut g = c.benchmark_group("expr");

    g.bench_function("parse", |b| b.iter(|| parse_expr(black_box(EXPR))));

    let expr = parse_expr(EXPR).unwrap();
    g.bench_function("eval", |b| b.iter(|| eval_expr(black_box(&expr), &mut Vars)));

    let text = "<h1>{title}</h1> has {x} items at {y} each: {int(x * y)} total. ".repeat(20);
    g.bench_function("interpolate", |b| {
        b.iter(|| interpolate(black_box(&text), &mut Vars))
    });

    g.finish();
}

fn bench_engine(c: &mut Criterion) {
    let page = make_page(200);
    c.bench_function("render_table_200", |b| {
        b.iter(|| {
            let mut engine = Engine::new();
            engine.render_str(black_box(&page))
        })
    });
}

criterion_group!(benches, bench_expr, bench_engine);
criterion_main!(benches);
