//! Benchmarks for the fixed-point interpreter.
//!
//! - A single counting loop, dominated by block passes until widening
//! - A chain of functions calling each other, dominated by worklist visits
//! - Container arithmetic on its own

extern crate irscope;

use criterion::{criterion_group, criterion_main, Criterion};
use irscope::prelude::*;
use std::hint::black_box;

/// `for (i = 0; i != limit; i += step) {}` returning `i`.
fn counting_loop(width: u32, step: u64, limit: u64) -> Module {
    let mut builder = ModuleBuilder::new("loop");
    let main = builder.declare_function("main", vec![], IrType::Integer(width));
    builder
        .define(main, |b| {
            let entry = b.entry();
            let header = b.add_block();
            let exit = b.add_block();
            b.br(header);
            b.position(header);
            let i = b.phi(IrType::Integer(width), vec![(Operand::int(width, 0), entry)]);
            let next = b.add(i.clone(), Operand::int(width, step));
            b.add_incoming(&i, next.clone(), header);
            let done = b.icmp(IntPredicate::Eq, next, Operand::int(width, limit));
            b.cond_br(done, exit, header);
            b.position(exit);
            b.ret(Some(i));
        })
        .unwrap();
    builder.build().unwrap()
}

/// `f0` calls `f1` calls ... `f{depth-1}`, each adding one to its argument.
fn call_chain(depth: usize) -> Module {
    let mut builder = ModuleBuilder::new("chain");
    let functions: Vec<FunctionId> = (0..depth)
        .map(|index| {
            builder.declare_function(
                format!("f{index}"),
                vec![IrType::Integer(32)],
                IrType::Integer(32),
            )
        })
        .collect();
    for (index, &function) in functions.iter().enumerate() {
        let next = functions.get(index + 1).copied();
        builder
            .define(function, |b| {
                let x = b.arg(0);
                let y = b.add(x, Operand::int(32, 1));
                let result = match next {
                    Some(callee) => b.call(callee, vec![y]),
                    None => y,
                };
                b.ret(Some(result));
            })
            .unwrap();
    }
    builder.build().unwrap()
}

fn bench_counting_loop(c: &mut Criterion) {
    let module = counting_loop(32, 1, 100);

    let mut group = c.benchmark_group("counting_loop");
    for (name, config) in [
        ("default", InterpreterConfig::default()),
        ("quick", InterpreterConfig::quick()),
        ("precise", InterpreterConfig::precise()),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut interpreter = Interpreter::new(&module, config.clone()).unwrap();
                black_box(interpreter.run())
            });
        });
    }
    group.finish();
}

fn bench_call_chain(c: &mut Criterion) {
    let module = call_chain(32);

    c.bench_function("call_chain_32", |b| {
        b.iter(|| {
            let mut interpreter =
                Interpreter::new(&module, InterpreterConfig::new().with_entry("f0")).unwrap();
            black_box(interpreter.run())
        });
    });
}

fn bench_container_ops(c: &mut Criterion) {
    let mut small = Container::from_constant(&ApInt::new(32, 3));
    for value in [5, 7, 11, 13] {
        small.merge(&Container::from_constant(&ApInt::new(32, value)));
    }
    let top = Container::top(32);

    c.bench_function("container_add_sets", |b| {
        b.iter(|| black_box(small.add(black_box(&small))));
    });
    c.bench_function("container_mul_top", |b| {
        b.iter(|| black_box(small.mul(black_box(&top))));
    });
    c.bench_function("container_icmp", |b| {
        b.iter(|| black_box(small.icmp(IntPredicate::Ult, black_box(&top))));
    });
}

criterion_group!(
    benches,
    bench_counting_loop,
    bench_call_chain,
    bench_container_ops
);
criterion_main!(benches);
