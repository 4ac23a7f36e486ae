//! Built-in behaviors.
//!
//! [`registry`] builds a table holding the wildcard behaviors every instance
//! answers, plus the collection behaviors of `Array` and `Dictionary`. The
//! collection behaviors keep their contents as JSON text in the `items`
//! variable; every mutating selector writes `items` back, which marks the
//! instance modified.

use serde_json::Value as JsonValue;
use trash_doc_codec::{index_from_value, render, render_opt, JsonArray, JsonObject};
use trash_instance_store::Instance;

use crate::registry::{HandlerContext, HandlerRegistry, WILDCARD_CLASS};
use crate::HandlerError;

pub const ARRAY_CLASS: &str = "Array";
pub const MAP_CLASS: &str = "Dictionary";

/// Variable holding the contents of collection instances.
pub const ITEMS_VAR: &str = "items";

/// Build a registry populated with every built-in behavior.
pub fn registry() -> HandlerRegistry {
    let registry = HandlerRegistry::new();
    register_object_handlers(&registry);
    register_array_handlers(&registry, ARRAY_CLASS);
    register_map_handlers(&registry, MAP_CLASS);
    registry
}

fn boolean(value: bool) -> String {
    value.to_string()
}

/// Behaviors every class answers through the wildcard entry.
pub fn register_object_handlers(registry: &HandlerRegistry) {
    registry.register(WILDCARD_CLASS, "class", |_, instance, _| {
        Ok(instance.class().to_string())
    });
    registry.register(WILDCARD_CLASS, "yourself", |_, instance, _| {
        Ok(instance.id().to_string())
    });
    registry.register(WILDCARD_CLASS, "id", |_, instance, _| {
        Ok(instance.id().to_string())
    });
    registry.register(WILDCARD_CLASS, "printString", |_, instance, _| {
        Ok(format!("<{} {}>", instance.class(), instance.id()))
    });
    registry.register(WILDCARD_CLASS, "asJson", |_, instance, _| {
        Ok(instance.to_json()?)
    });
}

fn load_array(instance: &Instance) -> JsonArray {
    JsonArray::from_value(instance.get_var(ITEMS_VAR))
}

fn store_array(instance: &mut Instance, items: &JsonArray) -> Result<(), HandlerError> {
    instance.set_var(ITEMS_VAR, JsonValue::String(items.to_json()?))?;
    Ok(())
}

fn index_argument(context: &HandlerContext, args: &[JsonValue]) -> Result<i64, HandlerError> {
    let value = context.argument(args, 0, 1)?;
    index_from_value(value)
        .ok_or_else(|| context.invalid_argument(format!("expected an integer index, got {}", value)))
}

/// Array behaviors, registered for `class`.
pub fn register_array_handlers(registry: &HandlerRegistry, class: &str) {
    registry.register(class, "size", |_, instance, _| {
        Ok(load_array(instance).len().to_string())
    });
    registry.register(class, "isEmpty", |_, instance, _| {
        Ok(boolean(load_array(instance).is_empty()))
    });
    registry.register(class, "first", |_, instance, _| {
        Ok(render_opt(load_array(instance).first()))
    });
    registry.register(class, "last", |_, instance, _| {
        Ok(render_opt(load_array(instance).last()))
    });
    registry.register(class, "at:", |context, instance, args| {
        let index = index_argument(context, args)?;
        Ok(render_opt(load_array(instance).get(index)))
    });
    registry.register(class, "at:put:", |context, instance, args| {
        let value = context.argument(args, 1, 2)?.clone();
        let index = index_argument(context, args)?;
        let mut items = load_array(instance);
        // Out-of-range writes are dropped; the caller still gets its value back.
        items.set(index, value.clone());
        store_array(instance, &items)?;
        Ok(render(&value))
    });
    registry.register(class, "push:", |context, instance, args| {
        let value = context.argument(args, 0, 1)?.clone();
        let mut items = load_array(instance);
        items.push(value.clone());
        store_array(instance, &items)?;
        Ok(render(&value))
    });
    registry.register(class, "pop", |_, instance, _| {
        let mut items = load_array(instance);
        let popped = items.pop();
        store_array(instance, &items)?;
        Ok(render_opt(popped.as_ref()))
    });
    registry.register(class, "getItems", |_, instance, _| {
        Ok(load_array(instance).to_json()?)
    });
    registry.register(class, "setItems:", |context, instance, args| {
        let text = items_text(context, context.argument(args, 0, 1)?)?;
        instance.set_var(ITEMS_VAR, JsonValue::String(text.clone()))?;
        Ok(text)
    });
}

fn load_map(instance: &Instance) -> JsonObject {
    JsonObject::from_value(instance.get_var(ITEMS_VAR))
}

fn store_map(instance: &mut Instance, entries: &JsonObject) -> Result<(), HandlerError> {
    instance.set_var(ITEMS_VAR, JsonValue::String(entries.to_json()?))?;
    Ok(())
}

fn key_argument(context: &HandlerContext, args: &[JsonValue]) -> Result<String, HandlerError> {
    Ok(render(context.argument(args, 0, 1)?))
}

/// Map behaviors, registered for `class`.
pub fn register_map_handlers(registry: &HandlerRegistry, class: &str) {
    registry.register(class, "size", |_, instance, _| {
        Ok(load_map(instance).len().to_string())
    });
    registry.register(class, "isEmpty", |_, instance, _| {
        Ok(boolean(load_map(instance).is_empty()))
    });
    registry.register(class, "at:", |context, instance, args| {
        let key = key_argument(context, args)?;
        Ok(render_opt(load_map(instance).get(&key)))
    });
    registry.register(class, "at:put:", |context, instance, args| {
        let value = context.argument(args, 1, 2)?.clone();
        let key = key_argument(context, args)?;
        let mut entries = load_map(instance);
        entries.put(key, value.clone());
        store_map(instance, &entries)?;
        Ok(render(&value))
    });
    registry.register(class, "includesKey:", |context, instance, args| {
        let key = key_argument(context, args)?;
        Ok(boolean(load_map(instance).contains_key(&key)))
    });
    registry.register(class, "removeAt:", |context, instance, args| {
        let key = key_argument(context, args)?;
        let mut entries = load_map(instance);
        match entries.remove(&key) {
            Some(removed) => {
                store_map(instance, &entries)?;
                Ok(render(&removed))
            }
            None => Ok(String::new()),
        }
    });
    registry.register(class, "keys", |_, instance, _| {
        Ok(serde_json::to_string(&load_map(instance).keys())?)
    });
    registry.register(class, "getItems", |_, instance, _| {
        Ok(load_map(instance).to_json()?)
    });
    registry.register(class, "setItems:", |context, instance, args| {
        let text = items_text(context, context.argument(args, 0, 1)?)?;
        instance.set_var(ITEMS_VAR, JsonValue::String(text.clone()))?;
        Ok(text)
    });
}

/// Text stored by `setItems:`. Strings are kept verbatim, inline containers
/// are encoded.
fn items_text(context: &HandlerContext, value: &JsonValue) -> Result<String, HandlerError> {
    match value {
        JsonValue::String(text) => Ok(text.clone()),
        JsonValue::Array(_) | JsonValue::Object(_) => Ok(serde_json::to_string(value)?),
        other => Err(context.invalid_argument(format!(
            "expected JSON text, an array or an object, got {}",
            other
        ))),
    }
}
