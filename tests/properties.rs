//! Properties every unboxing run must satisfy, checked on one mixed program.
//!
//! The program has an enum that can be unboxed (`Color`, used through
//! constants, a phi, `ordinal()` and `values()`) next to one that cannot
//! (`Op`, cast to an interface in two methods).

mod common;

use std::collections::HashSet;

use common::{color, current, init_logging, op, unboxed_references, Interpreter, Value};
use enumbox::{enums::EnumUnboxer, prelude::*, Error};

struct Mixed {
    color: EnumClass,
    op: EnumClass,
    pick_ordinal: MethodRef,
    all: MethodRef,
    count: MethodRef,
}

fn mixed_program() -> (AppView, CompilerContext, Mixed) {
    let mut builder = ProgramBuilder::new();
    let known = builder.known().clone();
    let color = color(&mut builder);
    let op = op(&mut builder);
    let coded = builder.class("com.example.Coded", |c| {
        c.flags(AccessFlags::PUBLIC | AccessFlags::INTERFACE | AccessFlags::ABSTRACT);
    });
    let (red, blue) = (color.constant(0), color.constant(2));
    let values = color.values.expect("values() generated");
    let color_array = builder.symbols().array_of(color.ty);

    let mut methods = Vec::new();
    builder.class("com.example.Main", |c| {
        // return (i == 0 ? RED : BLUE).ordinal();
        methods.push(c.static_method("pickOrdinal", known.int, &[known.int], |f| {
            let i = f.arg(0);
            let (mut first, mut second) = (None, None);
            f.block(0, |b| b.if_z(CmpKind::Eq, i, 1, 2));
            f.block(1, |b| {
                first = Some(b.get_static(red));
                b.jump(3);
            });
            f.block(2, |b| {
                second = Some(b.get_static(blue));
                b.jump(3);
            });
            let (first, second) = (first.expect("block 1"), second.expect("block 2"));
            f.block(3, |b| {
                let picked = b.phi(SsaType::Ref(color.ty), &[(1, first), (2, second)]);
                let ordinal = b.call(InvokeKind::Virtual, known.enum_ordinal, &[picked]);
                b.ret_val(ordinal);
            });
        }));
        methods.push(c.static_method("all", color_array, &[], |f| {
            f.block(0, |b| {
                let all = b.call(InvokeKind::Static, values, &[]);
                b.ret_val(all);
            });
        }));
        methods.push(c.static_method("count", known.int, &[], |f| {
            f.block(0, |b| {
                let all = b.call(InvokeKind::Static, values, &[]);
                let length = b.array_length(all);
                b.ret_val(length);
            });
        }));
    });

    let add = op.constant(0);
    for class in ["com.example.Main$Codes", "com.example.Other"] {
        builder.class(class, |c| {
            c.static_method("asCoded", coded, &[], |f| {
                f.block(0, |b| {
                    let value = b.get_static(add);
                    let cast = b.check_cast(value, coded);
                    b.ret_val(cast);
                });
            });
        });
    }

    let (app, ctx) = builder.build();
    let mixed = Mixed {
        color,
        op,
        pick_ordinal: methods[0],
        all: methods[1],
        count: methods[2],
    };
    (app, ctx, mixed)
}

/// Runs the analysis stage only, analyzing every body `times` times.
fn analyze(app: &AppView, ctx: &CompilerContext, config: EnumUnboxingConfig, times: usize) -> Result<EnumUnboxer> {
    let unboxer = EnumUnboxer::new(app.symbols_arc(), config);
    unboxer.prepare(app, &ctx.events);
    for _ in 0..times {
        for method in app.program_methods() {
            ctx.with_ssa(method, |ssa| unboxer.analyze_method(app, method, ssa))
                .transpose()?;
        }
    }
    unboxer.update_candidates_info();
    Ok(unboxer)
}

fn names(app: &AppView, types: &[TypeRef]) -> Vec<String> {
    types.iter().map(|t| app.symbols().source_name(*t)).collect()
}

#[test]
fn test_no_reference_to_unboxed_enum_survives() -> Result<()> {
    init_logging();
    let (mut app, ctx, mixed) = mixed_program();

    let summary = unbox_program(&mut app, &ctx, EnumUnboxingConfig::default())?;
    assert_eq!(summary.unboxed, vec![mixed.color.ty]);
    assert!(app.class(mixed.op.ty).is_some());

    let leftovers = unboxed_references(&app, &ctx, &summary.unboxed);
    assert!(leftovers.is_empty(), "left over: {leftovers:#?}");
    for method in app.program_methods() {
        if let Some(ssa) = ctx.ssa(method) {
            ssa.verify()?;
        }
    }
    Ok(())
}

#[test]
fn test_unboxed_values_are_ordinal_plus_one() -> Result<()> {
    let (mut app, ctx, mixed) = mixed_program();
    let summary = unbox_program(&mut app, &ctx, EnumUnboxingConfig::default())?;
    let data = summary.data.data(mixed.color.ty).expect("Color has data");

    for (ordinal, field) in mixed.color.constants.iter().enumerate() {
        assert_eq!(data.unboxed_value(*field), Some(enumbox::enums::unboxed_value(ordinal)));
        assert_ne!(data.unboxed_value(*field), Some(0));
    }

    let mut interpreter = Interpreter::new(&app, &ctx);
    let pick = current(&app, mixed.pick_ordinal);
    assert_eq!(interpreter.call_int(pick, vec![Value::Int(0)]), Ok(0));
    assert_eq!(interpreter.call_int(pick, vec![Value::Int(7)]), Ok(2));
    Ok(())
}

#[test]
fn test_reanalysis_is_idempotent() -> Result<()> {
    let (app, ctx, _) = mixed_program();
    let symbols = app.symbols();

    let once = analyze(&app, &ctx, EnumUnboxingConfig::default(), 1)?;
    let twice = analyze(&app, &ctx, EnumUnboxingConfig::default(), 2)?;
    assert_eq!(once.candidates().types(symbols), twice.candidates().types(symbols));
    assert_eq!(once.rejections(), twice.rejections());
    Ok(())
}

#[test]
fn test_elimination_is_monotonic() -> Result<()> {
    let (mut app, ctx, mixed) = mixed_program();
    let initial: HashSet<TypeRef> = {
        let unboxer = EnumUnboxer::new(app.symbols_arc(), EnumUnboxingConfig::default());
        unboxer.prepare(&app, &ctx.events);
        unboxer.candidates().all_types(app.symbols()).into_iter().collect()
    };
    assert!(initial.contains(&mixed.color.ty) && initial.contains(&mixed.op.ty));

    let summary = unbox_program(&mut app, &ctx, EnumUnboxingConfig::default())?;
    assert!(summary.unboxed.iter().all(|ty| initial.contains(ty)));
    assert!(summary.rejected.iter().all(|(ty, _)| initial.contains(ty)));
    Ok(())
}

#[test]
fn test_lens_chain_resolves_against_final_program() -> Result<()> {
    let (mut app, ctx, mixed) = mixed_program();
    let methods = app.program_methods();
    let fields: Vec<FieldRef> = app
        .program_classes()
        .iter()
        .flat_map(|c| c.fields.iter().map(|f| f.field))
        .collect();

    let summary = unbox_program(&mut app, &ctx, EnumUnboxingConfig::default())?;
    let symbols = app.symbols_arc();
    let lens = app.graph_lens();
    assert!(!lens.is_identity());
    assert!(lens.enum_unboxing().is_some());

    for method in methods {
        let resolved = lens.lookup_method(&symbols, method, InvokeKind::Direct).method;
        let defined = app.method_definition(resolved).is_some();
        assert!(
            defined || summary.pruned.methods.contains(&method),
            "{} resolves to missing {}",
            symbols.method_to_source(method),
            symbols.method_to_source(resolved)
        );
        if defined && !app.method_definition(resolved).is_some_and(MethodDef::is_abstract) {
            assert!(ctx.has_ssa(resolved), "{} has no body", symbols.method_to_source(resolved));
        }
    }
    for field in fields {
        let resolved = lens.lookup_field(&symbols, field);
        assert!(
            app.field_definition(resolved).is_some() || summary.pruned.fields.contains(&field),
            "{} resolves to missing {}",
            symbols.field_to_source(field),
            symbols.field_to_source(resolved)
        );
    }

    // Types map to int; unrelated types stay.
    assert_eq!(lens.lookup_type(&symbols, mixed.color.ty), app.known().int);
    assert_eq!(lens.lookup_type(&symbols, mixed.op.ty), mixed.op.ty);
    Ok(())
}

#[test]
fn test_values_round_trip() -> Result<()> {
    init_logging();
    let (mut app, ctx, mixed) = mixed_program();
    let before = Interpreter::new(&app, &ctx).call(mixed.all, Vec::new());
    assert!(matches!(before, Ok(Some(Value::Array(ref a))) if a.borrow().len() == 3));

    let summary = unbox_program(&mut app, &ctx, EnumUnboxingConfig::default())?;

    let mut interpreter = Interpreter::new(&app, &ctx);
    let all = interpreter
        .call(current(&app, mixed.all), Vec::new())
        .expect("all() runs")
        .and_then(|v| v.as_ints());
    assert_eq!(all, Some(vec![1, 2, 3]));
    assert_eq!(interpreter.call_int(current(&app, mixed.count), Vec::new()), Ok(3));

    // Copies of unboxed $VALUES are already fresh, so no clone() remains.
    // Enums that stay boxed keep theirs.
    let symbols = app.symbols();
    let boxed: Vec<TypeRef> = summary.rejected.iter().map(|(ty, _)| *ty).collect();
    assert!(boxed.contains(&mixed.op.ty));
    for method in app.program_methods() {
        if boxed.contains(&symbols.method_holder(method)) {
            continue;
        }
        let clones = ctx
            .with_ssa(method, |ssa| {
                ssa.instructions()
                    .filter(|(_, i)| {
                        matches!(i.op(), SsaOp::Invoke { method, .. } if symbols.method_name(*method) == "clone")
                    })
                    .count()
            })
            .unwrap_or_default();
        assert_eq!(clones, 0, "{} still clones", symbols.method_to_source(method));
    }
    assert!(ctx.events.has(EventKind::CloneElided));
    Ok(())
}

#[test]
fn test_debug_mode_keeps_every_reason() -> Result<()> {
    init_logging();
    let (app, ctx, mixed) = mixed_program();
    let symbols = app.symbols();

    // Without debug logging a rejected enum leaves the candidates at the
    // first wave boundary; with it, it stays until the analysis finishes.
    let quiet = analyze(&app, &ctx, EnumUnboxingConfig::default(), 1)?;
    assert!(!quiet.candidates().types(symbols).contains(&mixed.op.ty));
    let verbose = analyze(&app, &ctx, EnumUnboxingConfig::debug(), 1)?;
    assert!(verbose.candidates().types(symbols).contains(&mixed.op.ty));

    let down_casts = |unboxer: &EnumUnboxer| {
        unboxer
            .rejections()
            .into_iter()
            .filter(|(ty, _)| *ty == mixed.op.ty)
            .flat_map(|(_, reasons)| reasons)
            .filter(|r| r.kind() == ReasonKind::DownCast)
            .count()
    };
    assert_eq!(down_casts(&quiet), 1);
    assert_eq!(down_casts(&verbose), 2);

    // Both modes unbox the same enums; debug mode prints the report.
    let (mut quiet_app, quiet_ctx, _) = mixed_program();
    let quiet_summary = unbox_program(&mut quiet_app, &quiet_ctx, EnumUnboxingConfig::default())?;
    let (mut debug_app, debug_ctx, _) = mixed_program();
    let debug_summary = unbox_program(&mut debug_app, &debug_ctx, EnumUnboxingConfig::debug())?;
    assert_eq!(
        names(&quiet_app, &quiet_summary.unboxed),
        names(&debug_app, &debug_summary.unboxed)
    );

    let report = debug_ctx
        .events
        .filter_kind(EventKind::Info)
        .find(|e| e.message.contains("Unable to unbox"))
        .expect("debug report recorded");
    assert!(report.message.contains("Unboxed 1 enums"));
    assert!(report.message.contains("Unable to unbox 1 enums"));
    assert!(report.message.contains("com.example.Op"));
    assert!(report.message.contains("DownCast (x2)"));
    assert!(!quiet_ctx
        .events
        .filter_kind(EventKind::Info)
        .any(|e| e.message.contains("Unable to unbox")));
    Ok(())
}

#[test]
fn test_required_enum_not_unboxed_is_an_error() {
    let (mut app, ctx, _) = mixed_program();
    let config = EnumUnboxingConfig::default()
        .require_unboxed("com.example.Op")
        .require_unboxed("com.example.Color");

    match unbox_program(&mut app, &ctx, config) {
        Err(Error::EnumsNotUnboxed { classes }) => {
            assert_eq!(classes, vec!["com.example.Op".to_string()]);
        }
        other => panic!("expected EnumsNotUnboxed, got {other:?}"),
    }
}

#[test]
fn test_disabled_config_changes_nothing() -> Result<()> {
    let (mut app, ctx, mixed) = mixed_program();
    let before = common::body_ops(&ctx, mixed.pick_ordinal);

    let summary = unbox_program(&mut app, &ctx, EnumUnboxingConfig::disabled())?;
    assert!(summary.unboxed.is_empty());
    assert!(summary.rejected.is_empty());
    assert!(app.class(mixed.color.ty).is_some());
    assert!(app.graph_lens().is_identity());
    assert_eq!(common::body_ops(&ctx, mixed.pick_ordinal), before);
    assert!(ctx.events.is_empty());
    Ok(())
}

#[test]
fn test_wave_size_does_not_change_the_outcome() -> Result<()> {
    let run = |wave_size: usize| -> Result<(Vec<String>, Vec<String>)> {
        let (mut app, ctx, _) = mixed_program();
        let config = EnumUnboxingConfig::default().with_wave_size(wave_size);
        let summary = unbox_program(&mut app, &ctx, config)?;
        let symbols = app.symbols();
        let reprocessed = summary
            .reprocessed
            .iter()
            .map(|m| symbols.method_to_source(*m))
            .collect();
        Ok((names(&app, &summary.unboxed), reprocessed))
    };
    assert_eq!(run(1)?, run(64)?);
    Ok(())
}
