//! Turning the surviving candidates into [`EnumData`].
//!
//! The per-method analysis only proves that every *use* of an enum can be
//! expressed on ints. Whether the enum's *contents* can be, is decided here,
//! from the static field values recorded for its class initializer:
//!
//! - each static field holding a constant must have a known ordinal,
//! - `$VALUES` must have known contents,
//! - every instance field some method reads must hold a single number or
//!   string per constant,
//! - for enums with constant bodies, the exact class of every constant must
//!   be known.

use std::collections::{BTreeMap, HashMap, HashSet};

use log::info;
use rayon::prelude::*;

use crate::{
    compiler::EventLog,
    enums::{
        data::unboxed_value, report::AnalysisReport, unboxer::EnumUnboxer, EnumData,
        EnumDataMap, EnumInstanceRef, InstanceFieldData, Reason,
    },
    program::{
        app::AppView,
        class::ClassDef,
        symbols::{FieldRef, TypeRef},
        value::{AbstractValue, ObjectState},
    },
};

impl EnumUnboxer {
    /// Decides the final set of unboxed enums and computes their data.
    ///
    /// With debug logging on, the analysis report is printed here and every
    /// enum with at least one reason is dropped.
    pub fn finish_analysis(&self, app: &AppView, events: &EventLog) -> EnumDataMap {
        let symbols = app.symbols();
        self.check_initializers(app);
        self.update_candidates_info();

        let candidates = self.candidates.types(symbols);
        let mut built: Vec<(TypeRef, Option<EnumData>)> = candidates
            .par_iter()
            .map(|ty| (*ty, self.build_enum_data(app, *ty)))
            .collect();
        built.sort_by_cached_key(|(ty, _)| symbols.source_name(*ty));

        let mut map = EnumDataMap::empty();
        for (ty, data) in built {
            let Some(data) = data else {
                continue;
            };
            if self.config.debug_log && self.reasons.contains_key(&ty) {
                continue;
            }
            if self.candidates.is_invalidated(ty) {
                continue;
            }
            map.insert(ty, data);
            for sub in self.candidates.subtypes_of(symbols, ty) {
                map.add_subtype(sub, ty);
            }
        }

        if self.config.debug_log {
            let report = AnalysisReport::build(symbols, &map, &self.rejections());
            report.emit(events);
        }
        info!(
            "enum unboxing: {} of {} candidates have data",
            map.len(),
            candidates.len()
        );
        map
    }

    fn check_initializers(&self, app: &AppView) {
        let symbols = app.symbols();
        for ty in self.candidates.types(symbols) {
            let Some(class) = app.class(ty) else {
                continue;
            };
            if class
                .instance_initializers(symbols)
                .any(|m| m.info.init_may_have_other_side_effects)
            {
                self.report_failure(ty, Reason::InvalidInit);
            }
            if class.class_init_may_have_side_effects {
                self.report_failure(ty, Reason::InvalidClinit);
            }
            for sub in self.candidates.subtypes_of(symbols, ty) {
                let Some(sub_class) = app.class(sub) else {
                    continue;
                };
                if sub_class
                    .instance_initializers(symbols)
                    .any(|m| m.info.init_may_have_other_side_effects)
                {
                    self.report_failure(ty, Reason::InvalidSubtypeInit);
                }
                if sub_class.class_initializer(symbols).is_some() {
                    self.report_failure(ty, Reason::SubtypeClinit);
                }
            }
        }
    }

    fn build_enum_data(&self, app: &AppView, ty: TypeRef) -> Option<EnumData> {
        let class = app.class(ty)?;
        let builder = EnumDataBuilder {
            unboxer: self,
            app,
            class,
            ty,
            has_subtypes: !self.candidates.subtypes_of(app.symbols(), ty).is_empty(),
            failed: false,
            unboxed_values: HashMap::new(),
            states: BTreeMap::new(),
            subtype_by_ordinal: BTreeMap::new(),
            values_fields: HashSet::new(),
            values_size: None,
        };
        builder.build()
    }
}

struct EnumDataBuilder<'a> {
    unboxer: &'a EnumUnboxer,
    app: &'a AppView,
    class: &'a ClassDef,
    ty: TypeRef,
    has_subtypes: bool,
    failed: bool,
    unboxed_values: HashMap<FieldRef, i32>,
    states: BTreeMap<usize, &'a ObjectState>,
    subtype_by_ordinal: BTreeMap<usize, TypeRef>,
    values_fields: HashSet<FieldRef>,
    values_size: Option<usize>,
}

impl EnumDataBuilder<'_> {
    fn fail(&mut self, reason: Reason) {
        self.failed = true;
        self.unboxer.report_failure(self.ty, reason);
    }

    /// Without debug logging the first failure ends the computation.
    fn stop(&self) -> bool {
        self.failed && !self.unboxer.config.debug_log
    }

    fn build(mut self) -> Option<EnumData> {
        let (app, class) = (self.app, self.class);
        let symbols = app.symbols();
        let static_fields: Vec<_> = class.static_fields().collect();
        if static_fields.is_empty() {
            return Some(EnumData::default());
        }
        let Some(values) = class.static_values.as_ref() else {
            self.fail(Reason::MissingEnumStaticFieldValues);
            return None;
        };

        let unboxer = self.unboxer;
        let registry = &unboxer.candidates;
        for def in &static_fields {
            let field_ty = symbols.field_type(def.field);
            if registry.representative(field_ty) != Some(self.ty) {
                continue;
            }
            let Some(state) = values.object_state(def.field) else {
                if !def.info.is_dead {
                    self.fail(Reason::MissingObjectStateForEnumInstance(def.field));
                }
                continue;
            };
            let ordinal_field = app.known().enum_ordinal_field;
            let Some(ordinal) = state
                .get(ordinal_field)
                .as_number()
                .and_then(|n| usize::try_from(n).ok())
            else {
                self.fail(Reason::MissingInstanceFieldValueForEnumInstance {
                    field: Some(ordinal_field),
                    ordinal: None,
                });
                continue;
            };
            self.unboxed_values.insert(def.field, unboxed_value(ordinal));
            self.states.insert(ordinal, state);
            if self.has_subtypes {
                match def.info.exact_dynamic_type {
                    Some(exact) => {
                        self.subtype_by_ordinal.insert(ordinal, exact);
                    }
                    None => self.fail(Reason::MissingExactDynamicEnumTypeForEnumWithSubtypes(
                        EnumInstanceRef::Field(def.field),
                    )),
                }
            }
        }
        if self.stop() {
            return None;
        }

        let values_ty = symbols.array_of(self.ty);
        for def in &static_fields {
            if symbols.field_type(def.field) != values_ty {
                continue;
            }
            self.values_fields.insert(def.field);
            let Some(array) = values.values_state(def.field) else {
                if !def.info.is_dead {
                    self.fail(Reason::MissingContentsForEnumValuesArray(def.field));
                }
                continue;
            };
            self.values_size = Some(array.len());
            for ordinal in 0..array.len() {
                if self.states.contains_key(&ordinal) {
                    continue;
                }
                match array.state_for_ordinal(ordinal).filter(|s| !s.is_empty()) {
                    Some(state) => {
                        self.states.insert(ordinal, state);
                    }
                    None => {
                        self.fail(Reason::MissingInstanceFieldValueForEnumInstance {
                            field: None,
                            ordinal: Some(ordinal),
                        });
                        continue;
                    }
                }
                if self.has_subtypes {
                    match array.class_for_ordinal(ordinal) {
                        Some(exact) => {
                            self.subtype_by_ordinal.insert(ordinal, exact);
                        }
                        None => self.fail(Reason::MissingExactDynamicEnumTypeForEnumWithSubtypes(
                            EnumInstanceRef::Ordinal(ordinal),
                        )),
                    }
                }
            }
        }
        if self.stop() {
            return None;
        }

        let instance_fields = self.instance_field_data();
        if self.failed {
            return None;
        }

        Some(EnumData::new(
            instance_fields,
            self.has_subtypes.then(|| std::mem::take(&mut self.subtype_by_ordinal)),
            std::mem::take(&mut self.unboxed_values),
            std::mem::take(&mut self.values_fields),
            self.values_size,
        ))
    }

    fn instance_field_data(&mut self) -> HashMap<FieldRef, InstanceFieldData> {
        let app = self.app;
        let symbols = app.symbols();
        let int = app.known().int;
        let mut result = HashMap::new();
        let required = self.unboxer.candidates.required_fields(symbols, self.ty);
        let states: Vec<(usize, &ObjectState)> = self.states.iter().map(|(o, s)| (*o, *s)).collect();

        for field in required {
            let mut mapping = BTreeMap::new();
            let mut complete = true;
            for (ordinal, state) in &states {
                let value = state.get(field);
                if !value.is_single_value() {
                    self.fail(Reason::MissingInstanceFieldValueForEnumInstance {
                        field: Some(field),
                        ordinal: Some(*ordinal),
                    });
                    complete = false;
                } else if !value.is_number_or_string() {
                    self.fail(Reason::UnsupportedInstanceFieldValueForEnumInstance {
                        field,
                        ordinal: *ordinal,
                    });
                    complete = false;
                } else {
                    mapping.insert(*ordinal, value.clone());
                }
                if self.stop() {
                    return result;
                }
            }
            if !complete {
                continue;
            }
            let ordinal_derived = symbols.field_type(field) == int
                && mapping.iter().all(|(ordinal, value)| {
                    matches!(value, AbstractValue::Number(n) if usize::try_from(*n).ok() == Some(*ordinal))
                });
            let data = if ordinal_derived {
                InstanceFieldData::OrdinalDerived
            } else {
                InstanceFieldData::Mapping(mapping)
            };
            result.insert(field, data);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        enums::EnumUnboxingConfig,
        program::{builder::ProgramBuilder, value::EnumStaticFieldValues},
    };

    fn unboxer(app: &AppView, config: EnumUnboxingConfig) -> EnumUnboxer {
        let unboxer = EnumUnboxer::new(app.symbols_arc(), config);
        unboxer.prepare(app, &EventLog::new());
        unboxer
    }

    #[test]
    fn test_data_for_simple_enum() {
        let mut builder = ProgramBuilder::new();
        let color = builder.enum_class("com.example.Color", |e| {
            e.constants(&["RED", "GREEN", "BLUE"]);
        });
        let (app, _ctx) = builder.build();
        let unboxer = unboxer(&app, EnumUnboxingConfig::default());

        let map = unboxer.finish_analysis(&app, &EventLog::new());
        let data = map.data(color.ty).expect("unboxed");
        assert_eq!(data.unboxed_value(color.constant(0)), Some(1));
        assert_eq!(data.unboxed_value(color.constant(2)), Some(3));
        assert_eq!(data.values_size(), Some(3));
        assert!(data.is_values_field(color.values_field));
        assert_eq!(data.live_ordinals(), vec![0, 1, 2]);
    }

    #[test]
    fn test_missing_static_values_rejects() {
        let mut builder = ProgramBuilder::new();
        let color = builder.enum_class("com.example.Color", |e| {
            e.constants(&["RED"]);
            e.without_static_values();
        });
        let (app, _ctx) = builder.build();
        let unboxer = unboxer(&app, EnumUnboxingConfig::default());

        let map = unboxer.finish_analysis(&app, &EventLog::new());
        assert!(map.is_empty());
        assert_eq!(
            unboxer.rejections(),
            vec![(color.ty, vec![Reason::MissingEnumStaticFieldValues])]
        );
    }

    #[test]
    fn test_required_name_field_is_mapped() {
        let mut builder = ProgramBuilder::new();
        let color = builder.enum_class("com.example.Color", |e| {
            e.constants(&["RED", "GREEN"]);
        });
        let (app, _ctx) = builder.build();
        let unboxer = unboxer(&app, EnumUnboxingConfig::default());
        let name = app.known().enum_name_field;
        unboxer.candidates.add_required_field(color.ty, name);

        let map = unboxer.finish_analysis(&app, &EventLog::new());
        let data = map.data(color.ty).expect("unboxed");
        match data.instance_field(name) {
            Some(InstanceFieldData::Mapping(mapping)) => {
                assert_eq!(mapping.get(&1), Some(&AbstractValue::String(Arc::from("GREEN"))));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_instance_field_value_rejects() {
        let mut builder = ProgramBuilder::new();
        let int = builder.known().int;
        let op = builder.enum_class("com.example.Op", |e| {
            e.instance_field("code", int);
            e.constant("ADD", &[crate::analysis::ConstValue::Int(10)]);
        });
        let (mut app, _ctx) = builder.build();
        let code = op.instance_fields[0];

        // Forget the recorded value of `code`.
        let ordinal = app.known().enum_ordinal_field;
        let name = app.known().enum_name_field;
        let mut values = EnumStaticFieldValues::new();
        values.insert(
            op.constant(0),
            crate::program::value::StaticFieldValue::Object(
                ObjectState::new()
                    .with(ordinal, AbstractValue::Number(0))
                    .with(name, AbstractValue::String(Arc::from("ADD"))),
            ),
        );
        if let Some(class) = app.class_mut(op.ty) {
            class.static_values = Some(values);
        }

        let unboxer = unboxer(&app, EnumUnboxingConfig::debug());
        unboxer.candidates.add_required_field(op.ty, code);
        let map = unboxer.finish_analysis(&app, &EventLog::new());
        assert!(map.is_empty());
        let reasons = &unboxer.rejections()[0].1;
        assert!(reasons.contains(&Reason::MissingInstanceFieldValueForEnumInstance {
            field: Some(code),
            ordinal: Some(0),
        }));
    }

    #[test]
    fn test_double_instance_field_rejects() {
        let mut builder = ProgramBuilder::new();
        let double = builder.known().double;
        let planet = builder.enum_class("com.example.Planet", |e| {
            e.instance_field("mass", double);
            e.constant("MARS", &[crate::analysis::ConstValue::Double(6.42)]);
        });
        let (app, _ctx) = builder.build();
        let mass = planet.instance_fields[0];

        let unboxer = unboxer(&app, EnumUnboxingConfig::debug());
        unboxer.candidates.add_required_field(planet.ty, mass);
        let map = unboxer.finish_analysis(&app, &EventLog::new());
        assert!(map.is_empty());
        let reasons = &unboxer.rejections()[0].1;
        assert!(reasons.contains(&Reason::MissingInstanceFieldValueForEnumInstance {
            field: Some(mass),
            ordinal: Some(0),
        }));
    }
}
