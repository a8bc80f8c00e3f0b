/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Meta-object-driven reading/writing of properties, method invocation, and
//! reflective object description (spec.md §4.3).

use std::sync::Arc;

use serde_json::{json, Value};

use crate::errors::{ProbeError, ProbeResult};
use crate::framework::FrameworkObject;
use crate::variant::Variant;

const MAX_POSITIONAL_ARGS: usize = 10;

pub struct PropertyInfo {
    pub name: String,
    pub type_name: String,
    pub readable: bool,
    pub writable: bool,
    pub value: Value,
}

pub struct ObjectInfo {
    pub class_name: String,
    pub object_name: Option<String>,
    pub inheritance_chain: Vec<String>,
    pub visible: Option<bool>,
    pub enabled: Option<bool>,
}

pub struct MetaInspector;

impl MetaInspector {
    pub fn list_properties(obj: &Arc<dyn FrameworkObject>) -> Vec<PropertyInfo> {
        obj.list_properties()
            .into_iter()
            .map(|desc| {
                let value = obj.get_property(&desc.name).map(|v| v.to_json()).unwrap_or(Value::Null);
                PropertyInfo {
                    name: desc.name,
                    type_name: desc.type_name,
                    readable: desc.readable,
                    writable: desc.writable,
                    value,
                }
            })
            .collect()
    }

    pub fn list_methods(obj: &Arc<dyn FrameworkObject>) -> Vec<crate::framework::MethodDescriptor> {
        obj.list_methods()
    }

    pub fn list_signals(obj: &Arc<dyn FrameworkObject>) -> Vec<crate::framework::SignalDescriptor> {
        obj.list_signals()
    }

    pub fn object_info(obj: &Arc<dyn FrameworkObject>) -> ObjectInfo {
        ObjectInfo {
            class_name: obj.class_name(),
            object_name: obj.object_name(),
            inheritance_chain: obj.inheritance_chain(),
            visible: obj.visible(),
            enabled: obj.enabled(),
        }
    }

    pub fn get_property(obj: &Arc<dyn FrameworkObject>, id: &str, name: &str) -> ProbeResult<Value> {
        if let Some(desc) = obj.list_properties().into_iter().find(|p| p.name == name) {
            if !desc.readable {
                return Err(ProbeError::NotReadable {
                    id: id.to_string(),
                    name: name.to_string(),
                });
            }
        }
        obj.get_property(name)
            .map(|v| v.to_json())
            .ok_or_else(|| ProbeError::PropertyNotFound {
                id: id.to_string(),
                name: name.to_string(),
            })
    }

    pub fn set_property(obj: &Arc<dyn FrameworkObject>, id: &str, name: &str, value: &Value) -> ProbeResult<()> {
        let declared = obj.list_properties().into_iter().find(|p| p.name == name);

        if let Some(desc) = &declared {
            if !desc.writable {
                return Err(ProbeError::ReadOnly {
                    id: id.to_string(),
                    name: name.to_string(),
                });
            }
            let converted = Variant::from_json(value, Some(desc.type_name.as_str())).map_err(|reason| {
                ProbeError::ConversionFailed {
                    name: name.to_string(),
                    reason,
                }
            })?;
            obj.set_property(name, converted)
                .map_err(|reason| ProbeError::ConversionFailed { name: name.to_string(), reason })?;
            return Ok(());
        }

        let converted = Variant::from_json(value, None).map_err(|reason| ProbeError::ConversionFailed {
            name: name.to_string(),
            reason,
        })?;
        obj.set_dynamic_property(name, converted.clone());
        let read_back = obj.get_property(name);
        if read_back.as_ref() != Some(&converted) {
            return Err(ProbeError::ConversionFailed {
                name: name.to_string(),
                reason: "dynamic property failed read-back verification".to_string(),
            });
        }
        Ok(())
    }

    pub fn invoke_method(
        obj: &Arc<dyn FrameworkObject>,
        id: &str,
        name: &str,
        args_json: &[Value],
    ) -> ProbeResult<Value> {
        if args_json.len() > MAX_POSITIONAL_ARGS {
            return Err(ProbeError::InvalidParams(format!(
                "at most {MAX_POSITIONAL_ARGS} positional arguments are supported"
            )));
        }

        let method = obj
            .list_methods()
            .into_iter()
            .find(|m| m.name == name && m.parameter_types.len() == args_json.len())
            .ok_or_else(|| ProbeError::MethodNotFoundDomain {
                id: id.to_string(),
                name: name.to_string(),
                arity: args_json.len(),
            })?;

        let mut args = Vec::with_capacity(args_json.len());
        for (value, type_name) in args_json.iter().zip(method.parameter_types.iter()) {
            let converted = Variant::from_json(value, Some(type_name.as_str())).map_err(|reason| {
                ProbeError::InvocationFailed {
                    id: id.to_string(),
                    name: name.to_string(),
                    reason,
                }
            })?;
            args.push(converted);
        }

        match obj.invoke_method(name, &args) {
            Ok(Some(result)) => Ok(result.to_json()),
            Ok(None) => Ok(Value::Null),
            Err(reason) => Err(ProbeError::InvocationFailed {
                id: id.to_string(),
                name: name.to_string(),
                reason,
            }),
        }
    }
}

impl ObjectInfo {
    pub fn to_json(&self) -> Value {
        json!({
            "className": self.class_name,
            "objectName": self.object_name,
            "inheritanceChain": self.inheritance_chain,
            "visible": self.visible,
            "enabled": self.enabled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::{Framework, MethodDescriptor, PropertyDescriptor};
    use crate::refbackend::{ReferenceFramework, WidgetSpec};

    fn button() -> (Arc<dyn FrameworkObject>, Arc<ReferenceFramework>) {
        let fw = ReferenceFramework::new();
        let app = fw.application_object().unwrap();
        let button = fw.spawn_widget(
            &app,
            WidgetSpec {
                class_name: "QPushButton".into(),
                object_name: Some("saveButton".into()),
                properties: vec![("text".into(), Variant::Str("Save".into()))],
                declared_properties: vec![PropertyDescriptor {
                    name: "text".into(),
                    type_name: "QString".into(),
                    readable: true,
                    writable: true,
                }],
                methods: vec![MethodDescriptor {
                    name: "click".into(),
                    signature: "click()".into(),
                    return_type: "void".into(),
                    parameter_types: vec![],
                    parameter_names: vec![],
                    access: "public",
                }],
                ..Default::default()
            },
        );
        (button, fw)
    }

    #[test]
    fn get_property_returns_current_value() {
        let (button, _fw) = button();
        let value = MetaInspector::get_property(&button, "id", "text").unwrap();
        assert_eq!(value, json!("Save"));
    }

    #[test]
    fn get_property_missing_is_not_found() {
        let (button, _fw) = button();
        let err = MetaInspector::get_property(&button, "id", "nope").unwrap_err();
        assert!(matches!(err, ProbeError::PropertyNotFound { .. }));
    }

    #[test]
    fn set_property_then_get_round_trips() {
        let (button, _fw) = button();
        MetaInspector::set_property(&button, "id", "text", &json!("hello")).unwrap();
        let value = MetaInspector::get_property(&button, "id", "text").unwrap();
        assert_eq!(value, json!("hello"));
    }

    #[test]
    fn set_dynamic_property_creates_and_reads_back() {
        let (button, _fw) = button();
        MetaInspector::set_property(&button, "id", "customFlag", &json!(true)).unwrap();
        let value = MetaInspector::get_property(&button, "id", "customFlag").unwrap();
        assert_eq!(value, json!(true));
    }

    #[test]
    fn invoke_method_with_unknown_arity_is_method_not_found() {
        let (button, _fw) = button();
        let err = MetaInspector::invoke_method(&button, "id", "click", &[json!(1)]).unwrap_err();
        assert!(matches!(err, ProbeError::MethodNotFoundDomain { .. }));
    }

    #[test]
    fn invoke_method_success_returns_null_for_void() {
        let (button, _fw) = button();
        let result = MetaInspector::invoke_method(&button, "id", "click", &[]).unwrap();
        assert_eq!(result, Value::Null);
    }
}
