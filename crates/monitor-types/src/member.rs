//! Explicit member tables for objects reachable from the Monitor.
//!
//! Every type that should be scriptable registers a [`TypeInfo`] in a
//! [`TypeRegistry`] at startup. A `TypeInfo` lists the methods, properties,
//! fields and indexers of the type as typed closures. The action invoker
//! only ever looks at these tables.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::{MonitorError, Result};
use crate::value::{EnumSpec, Value};

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

/// Upcast helper so trait objects can be downcast to their concrete type.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An object the Monitor can resolve by name and act upon.
///
/// Implementors are shared with emulation threads, so any mutable state must
/// carry its own locking.
pub trait MonitorObject: AsAny + Send + Sync + 'static {
    /// Text printed when the object is the result of an action.
    fn label(&self) -> String {
        String::from("<object>")
    }
}

/// Shared handle to a [`MonitorObject`].
pub type ObjectRef = Arc<dyn MonitorObject>;

/// Runtime type identity of the concrete object behind a handle.
pub fn object_type_id(object: &dyn MonitorObject) -> TypeId {
    object.as_any().type_id()
}

/// Downcast a handle to its concrete type, failing with a device error.
pub fn downcast<'a, T: MonitorObject>(object: &'a ObjectRef, type_name: &str) -> Result<&'a T> {
    (**object)
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| MonitorError::Device(format!("target is not a {type_name}")))
}

// ---------------------------------------------------------------------------
// Value types
// ---------------------------------------------------------------------------

/// Width and signedness of an integer parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl IntKind {
    /// Size in bytes.
    pub fn bytes(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 => 4,
            Self::I64 | Self::U64 => 8,
        }
    }

    pub fn min(self) -> i128 {
        match self {
            Self::I8 => i8::MIN.into(),
            Self::I16 => i16::MIN.into(),
            Self::I32 => i32::MIN.into(),
            Self::I64 => i64::MIN.into(),
            _ => 0,
        }
    }

    pub fn max(self) -> i128 {
        match self {
            Self::I8 => i8::MAX.into(),
            Self::I16 => i16::MAX.into(),
            Self::I32 => i32::MAX.into(),
            Self::I64 => i64::MAX.into(),
            Self::U8 => u8::MAX.into(),
            Self::U16 => u16::MAX.into(),
            Self::U32 => u32::MAX.into(),
            Self::U64 => u64::MAX.into(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::I8 => "SByte",
            Self::I16 => "Int16",
            Self::I32 => "Int32",
            Self::I64 => "Int64",
            Self::U8 => "Byte",
            Self::U16 => "UInt16",
            Self::U32 => "UInt32",
            Self::U64 => "UInt64",
        }
    }
}

/// Declared type of a parameter, property, field, indexer or return value.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    Void,
    /// Accepts any value unchanged.
    Any,
    Bool,
    Int(IntKind),
    Float,
    String,
    Range,
    Enum(Arc<EnumSpec>),
    Nullable(Box<ValueType>),
    /// An object; `Some(name)` restricts it to types with that name or
    /// implementing that interface.
    Object(Option<&'static str>),
    Array(Box<ValueType>),
}

impl ValueType {
    pub fn is_string(&self) -> bool {
        matches!(self, Self::String)
    }

    /// Whether `null` is an acceptable value.
    pub fn accepts_null(&self) -> bool {
        matches!(self, Self::Nullable(_) | Self::Object(_) | Self::Any)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => write!(f, "Void"),
            Self::Any => write!(f, "Object"),
            Self::Bool => write!(f, "Boolean"),
            Self::Int(k) => write!(f, "{}", k.name()),
            Self::Float => write!(f, "Double"),
            Self::String => write!(f, "String"),
            Self::Range => write!(f, "Range"),
            Self::Enum(e) => write!(f, "{}", e.name),
            Self::Nullable(inner) => write!(f, "{inner}?"),
            Self::Object(Some(name)) => write!(f, "{name}"),
            Self::Object(None) => write!(f, "Object"),
            Self::Array(inner) => write!(f, "{inner}[]"),
        }
    }
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

pub type MethodFn = Rc<dyn Fn(&ObjectRef, &[Value]) -> Result<Value>>;
pub type GetterFn = Rc<dyn Fn(&ObjectRef) -> Result<Value>>;
pub type SetterFn = Rc<dyn Fn(&ObjectRef, Value) -> Result<()>>;
pub type IndexGetFn = Rc<dyn Fn(&ObjectRef, &[Value]) -> Result<Value>>;
pub type IndexSetFn = Rc<dyn Fn(&ObjectRef, &[Value], Value) -> Result<()>>;

/// One declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ValueType,
    /// Default value; its presence makes the parameter optional.
    pub default: Option<Value>,
    /// Allow-list constraint.
    pub allowed: Option<Vec<Value>>,
}

impl ParamSpec {
    pub fn new(name: &str, ty: ValueType) -> Self {
        Self {
            name: name.to_string(),
            ty,
            default: None,
            allowed: None,
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn allowed(mut self, values: Vec<Value>) -> Self {
        self.allowed = Some(values);
        self
    }

    pub fn is_optional(&self) -> bool {
        self.default.is_some()
    }
}

impl fmt::Display for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.ty, self.name)?;
        if let Some(default) = &self.default {
            match default {
                Value::Null => write!(f, " = null")?,
                Value::String(s) => write!(f, " = \"{s}\"")?,
                other => write!(f, " = {other}")?,
            }
        }
        Ok(())
    }
}

/// A callable method.
#[derive(Clone)]
pub struct MethodDescriptor {
    pub name: String,
    pub params: Vec<ParamSpec>,
    pub ret: ValueType,
    /// The last parameter is an array absorbing all remaining arguments.
    pub variadic: bool,
    /// Name of the type whose table declared the method.
    pub owner: String,
    pub call: MethodFn,
}

impl MethodDescriptor {
    /// Build a method whose closure receives the downcast target.
    pub fn for_type<T, F>(
        owner: &str,
        name: &str,
        params: Vec<ParamSpec>,
        ret: ValueType,
        f: F,
    ) -> Self
    where
        T: MonitorObject,
        F: Fn(&T, &[Value]) -> Result<Value> + 'static,
    {
        let type_name = owner.to_string();
        Self {
            name: name.to_string(),
            params,
            ret,
            variadic: false,
            owner: owner.to_string(),
            call: Rc::new(move |obj, args| f(downcast::<T>(obj, &type_name)?, args)),
        }
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = matches!(self.params.last(), Some(p) if matches!(p.ty, ValueType::Array(_)));
        self
    }

    /// Count of string-typed parameters, used to order overloads.
    pub fn string_param_count(&self) -> usize {
        self.params.iter().filter(|p| p.ty.is_string()).count()
    }

    /// `Name(Type, Type)`, used to drop inherited duplicates.
    pub fn signature(&self) -> String {
        let types: Vec<String> = self.params.iter().map(|p| p.ty.to_string()).collect();
        format!("{}({})", self.name, types.join(", "))
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodDescriptor({} -> {})", self.signature(), self.ret)
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.params.iter().map(ToString::to_string).collect();
        write!(f, "{} {} ({})", self.ret, self.name, params.join(", "))
    }
}

/// A property with optional accessors.
#[derive(Clone)]
pub struct PropertyDescriptor {
    pub name: String,
    pub ty: ValueType,
    pub get: Option<GetterFn>,
    pub set: Option<SetterFn>,
}

/// A field; read-only when it has no setter.
#[derive(Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub ty: ValueType,
    pub get: GetterFn,
    pub set: Option<SetterFn>,
}

impl FieldDescriptor {
    pub fn is_read_only(&self) -> bool {
        self.set.is_none()
    }
}

/// An indexer: `target Name [ index... ] value?`.
#[derive(Clone)]
pub struct IndexerDescriptor {
    pub name: String,
    pub params: Vec<ParamSpec>,
    pub ty: ValueType,
    pub get: Option<IndexGetFn>,
    pub set: Option<IndexSetFn>,
}

// ---------------------------------------------------------------------------
// TypeInfo
// ---------------------------------------------------------------------------

/// The member table of one registered type.
#[derive(Clone)]
pub struct TypeInfo {
    pub name: String,
    /// Interface names the type satisfies, for object-typed parameters.
    pub interfaces: Vec<&'static str>,
    pub methods: Vec<MethodDescriptor>,
    pub properties: Vec<PropertyDescriptor>,
    pub fields: Vec<FieldDescriptor>,
    pub indexers: Vec<IndexerDescriptor>,
}

impl TypeInfo {
    /// Whether the type is, or implements, `name`.
    pub fn satisfies(&self, name: &str) -> bool {
        self.name == name || self.interfaces.iter().any(|i| *i == name)
    }

    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodDescriptor> {
        self.methods.iter().filter(move |m| m.name == name)
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn indexers_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a IndexerDescriptor> {
        self.indexers.iter().filter(move |i| i.name == name)
    }

    /// The shared indexer name, if every indexer uses the same one.
    pub fn default_indexer_name(&self) -> Option<&str> {
        let first = self.indexers.first()?;
        self.indexers
            .iter()
            .all(|i| i.name == first.name)
            .then_some(first.name.as_str())
    }

    /// Sorted, deduplicated names of all members.
    pub fn member_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .methods
            .iter()
            .map(|m| m.name.clone())
            .chain(self.properties.iter().map(|p| p.name.clone()))
            .chain(self.fields.iter().map(|f| f.name.clone()))
            .chain(self.indexers.iter().map(|i| i.name.clone()))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.methods.iter().any(|m| m.name == name)
            || self.property(name).is_some()
            || self.field(name).is_some()
            || self.indexers.iter().any(|i| i.name == name)
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("interfaces", &self.interfaces)
            .field("methods", &self.methods.len())
            .field("properties", &self.properties.len())
            .field("fields", &self.fields.len())
            .field("indexers", &self.indexers.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// TypeInfoBuilder
// ---------------------------------------------------------------------------

/// Typed builder for a [`TypeInfo`]: closures receive `&T` directly.
///
/// Members shared by several types are written once as a generic function
/// over a trait and pulled in with [`TypeInfoBuilder::inherit`]. Inherited
/// members are dropped when the type declares one with the same signature.
pub struct TypeInfoBuilder<T> {
    own: TypeInfo,
    inherited: TypeInfo,
    inheriting: bool,
    _marker: PhantomData<fn(&T)>,
}

impl<T: MonitorObject> TypeInfoBuilder<T> {
    pub fn new(name: &str) -> Self {
        let empty = TypeInfo {
            name: name.to_string(),
            interfaces: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            fields: Vec::new(),
            indexers: Vec::new(),
        };
        Self {
            inherited: empty.clone(),
            own: empty,
            inheriting: false,
            _marker: PhantomData,
        }
    }

    fn table(&mut self) -> &mut TypeInfo {
        if self.inheriting {
            &mut self.inherited
        } else {
            &mut self.own
        }
    }

    fn type_name(&self) -> String {
        self.own.name.clone()
    }

    pub fn implements(mut self, interface: &'static str) -> Self {
        self.own.interfaces.push(interface);
        self
    }

    /// Add a shared member set as inherited members.
    pub fn inherit(mut self, members: impl FnOnce(Self) -> Self) -> Self {
        let was = self.inheriting;
        self.inheriting = true;
        let mut this = members(self);
        this.inheriting = was;
        this
    }

    pub fn method<F>(mut self, name: &str, params: Vec<ParamSpec>, ret: ValueType, f: F) -> Self
    where
        F: Fn(&T, &[Value]) -> Result<Value> + 'static,
    {
        let owner = self.type_name();
        let method = MethodDescriptor::for_type::<T, F>(&owner, name, params, ret, f);
        self.table().methods.push(method);
        self
    }

    /// A method whose last parameter is an array absorbing remaining arguments.
    pub fn variadic_method<F>(
        mut self,
        name: &str,
        params: Vec<ParamSpec>,
        ret: ValueType,
        f: F,
    ) -> Self
    where
        F: Fn(&T, &[Value]) -> Result<Value> + 'static,
    {
        let owner = self.type_name();
        let method = MethodDescriptor::for_type::<T, F>(&owner, name, params, ret, f).variadic();
        self.table().methods.push(method);
        self
    }

    /// A read-write property.
    pub fn property<G, S>(mut self, name: &str, ty: ValueType, get: G, set: S) -> Self
    where
        G: Fn(&T) -> Result<Value> + 'static,
        S: Fn(&T, Value) -> Result<()> + 'static,
    {
        let getter = self.getter_fn(get);
        let setter = self.setter_fn(set);
        self.table().properties.push(PropertyDescriptor {
            name: name.to_string(),
            ty,
            get: Some(getter),
            set: Some(setter),
        });
        self
    }

    /// A get-only property.
    pub fn getter<G>(mut self, name: &str, ty: ValueType, get: G) -> Self
    where
        G: Fn(&T) -> Result<Value> + 'static,
    {
        let getter = self.getter_fn(get);
        self.table().properties.push(PropertyDescriptor {
            name: name.to_string(),
            ty,
            get: Some(getter),
            set: None,
        });
        self
    }

    /// A set-only property.
    pub fn setter<S>(mut self, name: &str, ty: ValueType, set: S) -> Self
    where
        S: Fn(&T, Value) -> Result<()> + 'static,
    {
        let setter = self.setter_fn(set);
        self.table().properties.push(PropertyDescriptor {
            name: name.to_string(),
            ty,
            get: None,
            set: Some(setter),
        });
        self
    }

    /// A read-only field.
    pub fn field<G>(mut self, name: &str, ty: ValueType, get: G) -> Self
    where
        G: Fn(&T) -> Result<Value> + 'static,
    {
        let getter = self.getter_fn(get);
        self.table().fields.push(FieldDescriptor {
            name: name.to_string(),
            ty,
            get: getter,
            set: None,
        });
        self
    }

    /// A mutable field.
    pub fn field_mut<G, S>(mut self, name: &str, ty: ValueType, get: G, set: S) -> Self
    where
        G: Fn(&T) -> Result<Value> + 'static,
        S: Fn(&T, Value) -> Result<()> + 'static,
    {
        let getter = self.getter_fn(get);
        let setter = self.setter_fn(set);
        self.table().fields.push(FieldDescriptor {
            name: name.to_string(),
            ty,
            get: getter,
            set: Some(setter),
        });
        self
    }

    /// An indexer; pass `None::<fn(&T, &[Value], Value) -> Result<()>>` for
    /// a read-only one.
    pub fn indexer<G, S>(
        mut self,
        name: &str,
        params: Vec<ParamSpec>,
        ty: ValueType,
        get: G,
        set: Option<S>,
    ) -> Self
    where
        G: Fn(&T, &[Value]) -> Result<Value> + 'static,
        S: Fn(&T, &[Value], Value) -> Result<()> + 'static,
    {
        let type_name = self.type_name();
        let getter: IndexGetFn = {
            let type_name = type_name.clone();
            Rc::new(move |obj, idx| get(downcast::<T>(obj, &type_name)?, idx))
        };
        let setter: Option<IndexSetFn> = set.map(|set| {
            Rc::new(move |obj: &ObjectRef, idx: &[Value], value: Value| {
                set(downcast::<T>(obj, &type_name)?, idx, value)
            }) as IndexSetFn
        });
        self.table().indexers.push(IndexerDescriptor {
            name: name.to_string(),
            params,
            ty,
            get: Some(getter),
            set: setter,
        });
        self
    }

    fn getter_fn<G>(&self, get: G) -> GetterFn
    where
        G: Fn(&T) -> Result<Value> + 'static,
    {
        let type_name = self.type_name();
        Rc::new(move |obj| get(downcast::<T>(obj, &type_name)?))
    }

    fn setter_fn<S>(&self, set: S) -> SetterFn
    where
        S: Fn(&T, Value) -> Result<()> + 'static,
    {
        let type_name = self.type_name();
        Rc::new(move |obj, value| set(downcast::<T>(obj, &type_name)?, value))
    }

    /// Finish the table, merging inherited members the type did not override.
    pub fn build(self) -> TypeInfo {
        let mut info = self.own;
        let inherited = self.inherited;

        let own_signatures: Vec<String> = info.methods.iter().map(MethodDescriptor::signature).collect();
        info.methods.extend(
            inherited
                .methods
                .into_iter()
                .filter(|m| !own_signatures.contains(&m.signature())),
        );
        for property in inherited.properties {
            if info.property(&property.name).is_none() {
                info.properties.push(property);
            }
        }
        for field in inherited.fields {
            if info.field(&field.name).is_none() {
                info.fields.push(field);
            }
        }
        for indexer in inherited.indexers {
            if !info.indexers.iter().any(|i| i.name == indexer.name && i.params == indexer.params) {
                info.indexers.push(indexer);
            }
        }
        info
    }
}

// ---------------------------------------------------------------------------
// TypeRegistry
// ---------------------------------------------------------------------------

/// Member tables keyed by concrete type, plus extension methods.
#[derive(Default)]
pub struct TypeRegistry {
    types: HashMap<TypeId, Rc<TypeInfo>>,
    extensions: HashMap<TypeId, Vec<MethodDescriptor>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the member table of `T`.
    pub fn register<T: MonitorObject>(&mut self, info: TypeInfo) {
        log::debug!("registering member table for {}", info.name);
        self.types.insert(TypeId::of::<T>(), Rc::new(info));
    }

    /// Attach an extra method to `T` from outside its own table.
    pub fn register_extension<T: MonitorObject>(&mut self, method: MethodDescriptor) {
        self.extensions
            .entry(TypeId::of::<T>())
            .or_default()
            .push(method);
    }

    pub fn type_of(&self, object: &dyn MonitorObject) -> Option<Rc<TypeInfo>> {
        self.types.get(&object_type_id(object)).map(Rc::clone)
    }

    pub fn extensions_of(&self, object: &dyn MonitorObject) -> &[MethodDescriptor] {
        self.extensions
            .get(&object_type_id(object))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether `object` is of, or implements, the type called `name`.
    pub fn is_instance(&self, object: &dyn MonitorObject, name: &str) -> bool {
        self.type_of(object).is_some_and(|t| t.satisfies(name))
    }

    pub fn type_name(&self, object: &dyn MonitorObject) -> String {
        self.type_of(object)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| "object".to_string())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
