//! Declarative intent types.

/// Declare a typed intent.
///
/// ```ignore
/// intent! {
///     /// A request to place an order.
///     pub struct Order: Resource {
///         required quantity: i64;
///         optional note: String;
///         default priority: i64 = |this| this.quantity() * 10;
///     }
/// }
/// ```
///
/// Each line declares one property and its accessor:
///
/// - `required name: T` must be present in every source; `name()` returns `T`.
/// - `optional name: T` may be absent; `name()` returns `Option<T>`.
/// - `default name: T = |this| ..` may be absent; `name()` falls back to the
///   given function of the intent.
///
/// Supertypes are listed after the name, separated by commas. Their
/// properties are required of sources too and are read through
/// [`Intent::upcast`](crate::Intent::upcast). The generated struct derives
/// `Clone`; property types must be `Clone` and implement
/// [`FromValue`](crate::FromValue), and defaulted ones `Into<Value>`.
#[macro_export]
macro_rules! intent {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident $(: $($parent:path),+ )? {
            $( $kind:ident $field:ident : $ty:ty $(= $default:expr)? ; )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone)]
        $vis struct $name {
            __sealed: $crate::intent::Sealed<$name>,
        }

        impl $name {
            $( $crate::__intent_field!(@accessor $kind $field : $ty $(= $default)?); )*
        }

        const _: () = {
            #[derive(Clone)]
            pub struct __Fields {
                $( pub $field: $crate::__intent_field!(@type $kind $ty), )*
            }

            impl $crate::intent::IntentFields for $name {
                type Fields = __Fields;

                #[allow(unused_variables)]
                fn read_fields(
                    data: &$crate::IntentData,
                ) -> ::std::result::Result<__Fields, $crate::PermitError> {
                    ::std::result::Result::Ok(__Fields {
                        $( $field: $crate::__intent_field!(@read data, $kind $field : $ty), )*
                    })
                }
            }
        };

        impl $crate::Intent for $name {
            fn intent_type() -> ::std::result::Result<
                ::std::sync::Arc<$crate::IntentType>,
                $crate::ConfigurationError,
            > {
                static TYPE: ::std::sync::OnceLock<
                    ::std::result::Result<::std::sync::Arc<$crate::IntentType>, $crate::ConfigurationError>,
                > = ::std::sync::OnceLock::new();
                ::std::clone::Clone::clone(TYPE.get_or_init(|| {
                    let builder = $crate::IntentType::builder(::core::stringify!($name));
                    $($(
                        let builder = builder.extends(<$parent as $crate::Intent>::intent_type()?);
                    )+)?
                    $(
                        let builder = $crate::__intent_field!(@decl builder, $name, $kind $field : $ty $(= $default)?);
                    )*
                    builder.build()
                }))
            }

            fn from_data(
                data: $crate::IntentData,
            ) -> ::std::result::Result<Self, $crate::PermitError> {
                ::std::result::Result::Ok(Self {
                    __sealed: $crate::intent::Sealed::new(data)?,
                })
            }

            fn data(&self) -> &$crate::IntentData {
                self.__sealed.data()
            }
        }

        impl $crate::FromValue for $name {
            // `Any` when the intent type cannot be built; `declared_type`
            // reports that failure.
            fn value_type() -> $crate::ValueType {
                match <$name as $crate::Intent>::intent_type() {
                    ::std::result::Result::Ok(intent_type) => $crate::ValueType::Intent(intent_type),
                    ::std::result::Result::Err(_) => $crate::ValueType::Any,
                }
            }

            fn declared_type() -> ::std::result::Result<$crate::ValueType, $crate::ConfigurationError> {
                ::std::result::Result::Ok($crate::ValueType::Intent(
                    <$name as $crate::Intent>::intent_type()?,
                ))
            }

            fn from_value(value: &$crate::Value) -> ::std::option::Option<Self> {
                match value {
                    $crate::Value::Intent(data) => {
                        <$name as $crate::Intent>::from_data(::std::clone::Clone::clone(data)).ok()
                    }
                    _ => ::std::option::Option::None,
                }
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Debug::fmt(self.__sealed.data(), f)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(self.__sealed.data(), f)
            }
        }

        impl ::std::cmp::PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.__sealed.data() == other.__sealed.data()
            }
        }

        impl ::std::cmp::Eq for $name {}

        impl ::std::hash::Hash for $name {
            fn hash<H: ::std::hash::Hasher>(&self, state: &mut H) {
                ::std::hash::Hash::hash(self.__sealed.data(), state)
            }
        }

        impl ::std::convert::From<$name> for $crate::Value {
            fn from(intent: $name) -> Self {
                $crate::Value::Intent(intent.__sealed.into_data())
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __intent_field {
    (@type required $ty:ty) => { $ty };
    (@type optional $ty:ty) => { ::std::option::Option<$ty> };
    (@type default $ty:ty) => { ::std::option::Option<$ty> };

    (@accessor required $field:ident : $ty:ty) => {
        pub fn $field(&self) -> $ty {
            ::std::clone::Clone::clone(&self.__sealed.fields().$field)
        }
    };
    (@accessor optional $field:ident : $ty:ty) => {
        pub fn $field(&self) -> ::std::option::Option<$ty> {
            ::std::clone::Clone::clone(&self.__sealed.fields().$field)
        }
    };
    (@accessor default $field:ident : $ty:ty = $default:expr) => {
        pub fn $field(&self) -> $ty {
            match &self.__sealed.fields().$field {
                ::std::option::Option::Some(value) => ::std::clone::Clone::clone(value),
                ::std::option::Option::None => {
                    let default: fn(&Self) -> $ty = $default;
                    default(self)
                }
            }
        }
    };

    (@decl $builder:ident, $name:ident, required $field:ident : $ty:ty) => {
        $builder.method($crate::MethodDecl::property(
            ::core::stringify!($field),
            <$ty as $crate::FromValue>::declared_type()?,
        ))
    };
    (@decl $builder:ident, $name:ident, optional $field:ident : $ty:ty) => {
        $builder.method($crate::MethodDecl::property(
            ::core::stringify!($field),
            $crate::ValueType::optional(<$ty as $crate::FromValue>::declared_type()?),
        ))
    };
    (@decl $builder:ident, $name:ident, default $field:ident : $ty:ty = $default:expr) => {
        $builder.method(
            $crate::MethodDecl::property(
                ::core::stringify!($field),
                <$ty as $crate::FromValue>::declared_type()?,
            )
            .with_body(|data: &$crate::IntentData, _: &[$crate::Value]| {
                match <$name as $crate::Intent>::from_data(::std::clone::Clone::clone(data)) {
                    ::std::result::Result::Ok(this) => {
                        let default: fn(&$name) -> $ty = $default;
                        $crate::Value::from(default(&this))
                    }
                    ::std::result::Result::Err(_) => $crate::Value::Null,
                }
            }),
        )
    };

    (@read $data:ident, required $field:ident : $ty:ty) => {
        $data.read::<$ty>(::core::stringify!($field))?
    };
    (@read $data:ident, optional $field:ident : $ty:ty) => {
        $data.read_optional::<$ty>(::core::stringify!($field))?
    };
    (@read $data:ident, default $field:ident : $ty:ty) => {
        $data.read_optional::<$ty>(::core::stringify!($field))?
    };
}

#[cfg(test)]
mod tests {
    use crate::intent::Sealed;
    use crate::{Intent, PermissionEngine, Value, ValueType};

    crate::intent! {
        struct Resource {
            required owner: String;
        }
    }

    crate::intent! {
        struct Ticket: Resource {
            required seats: i64;
            optional note: String;
            default priority: i64 = |this| this.seats() * 10;
        }
    }

    crate::intent! {
        struct Booking {
            required ticket: Ticket;
            required reference: String;
        }
    }

    #[test]
    fn generated_type_metadata() {
        let ticket = Ticket::intent_type().unwrap();
        let resource = Resource::intent_type().unwrap();
        assert_eq!(ticket.name(), "Ticket");
        assert!(ticket.is_subtype_of(&resource));
        assert!(std::sync::Arc::ptr_eq(&ticket, &Ticket::intent_type().unwrap()));

        let properties: Vec<_> = ticket
            .properties()
            .into_iter()
            .map(|p| (p.method, p.declared, p.optional))
            .collect();
        assert_eq!(
            properties,
            vec![
                ("note".to_string(), ValueType::optional(ValueType::Str), true),
                ("owner".to_string(), ValueType::Str, false),
                ("priority".to_string(), ValueType::Int, true),
                ("seats".to_string(), ValueType::Int, false),
            ]
        );
    }

    #[test]
    fn accessors_and_defaults() {
        let engine = PermissionEngine::builder().build().unwrap();
        let ticket: Ticket = engine
            .require(Value::map([("owner", Value::from("alice")), ("seats", Value::from(2))]))
            .unwrap();
        assert_eq!(ticket.seats(), 2);
        assert_eq!(ticket.note(), None);
        assert_eq!(ticket.priority(), 20);
        assert_eq!(ticket.data().invoke("priority", &[]), Ok(Value::Int(20)));

        let resource: Resource = ticket.upcast().unwrap();
        assert_eq!(resource.owner(), "alice");
        assert!(resource.upcast::<Ticket>().is_ok());
    }

    #[test]
    fn typed_fields_are_read_from_the_record() {
        let engine = PermissionEngine::builder().build().unwrap();
        let ticket: Ticket = engine
            .require(Value::map([("owner", Value::from("carol")), ("seats", Value::from(4))]))
            .unwrap();
        assert_eq!(ticket.__data__().get("seats"), Some(&Value::Int(ticket.seats())));

        let resource: Resource = engine.require(Value::map([("owner", "dave")])).unwrap();
        assert!(Sealed::<Ticket>::new(resource.data().clone()).is_err());
        assert!(Sealed::<Resource>::new(ticket.data().clone()).is_ok());
    }

    #[test]
    fn intent_typed_properties_come_from_nested_sources() {
        let engine = PermissionEngine::builder().build().unwrap();
        let booking: Booking = engine
            .require(Value::map([
                (
                    "ticket",
                    Value::map([("owner", Value::from("alice")), ("seats", Value::from(3))]),
                ),
                ("reference", Value::from("B-1")),
            ]))
            .unwrap();
        assert_eq!(booking.reference(), "B-1");
        assert_eq!(booking.ticket().seats(), 3);
        assert_eq!(booking.ticket().priority(), 30);

        let declared = Booking::intent_type()
            .unwrap()
            .method("ticket")
            .and_then(|m| m.decl.returns.clone());
        assert_eq!(declared, Some(ValueType::Intent(Ticket::intent_type().unwrap())));
    }

    #[test]
    fn upcast_to_unrelated_type_fails() {
        crate::intent! {
            struct Unrelated {
                optional anything: String;
            }
        }

        let engine = PermissionEngine::builder().build().unwrap();
        let resource: Resource = engine.require(Value::map([("owner", "bob")])).unwrap();
        assert!(resource.upcast::<Unrelated>().is_err());
    }
}
