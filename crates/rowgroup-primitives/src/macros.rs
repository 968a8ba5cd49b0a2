#[macro_export]
macro_rules! data_type_registry_entries {
    ($macro:ident $(, @args $($args:tt)+ )?) => {
        $macro! {
            $(
                @args $($args)+;
            )?
            @entries
            (
                Boolean,
                Bool,
                is_known = true,
                is_hashable = true,
                size_class = Fixed(8)
            ),
            (
                Bytes,
                Blob,
                is_known = true,
                is_hashable = true,
                size_class = Variable
            ),
            (
                Double,
                Numeric,
                is_known = true,
                is_hashable = true,
                size_class = Fixed(24)
            ),
            (
                Integer,
                Numeric,
                is_known = true,
                is_hashable = true,
                size_class = Fixed(16)
            ),
            (
                Long,
                Numeric,
                is_known = true,
                is_hashable = true,
                size_class = Fixed(24)
            ),
            (
                Object,
                Object,
                is_known = true,
                is_hashable = false,
                size_class = Unsupported
            ),
            (
                Text,
                Textual,
                is_known = true,
                is_hashable = true,
                size_class = Variable
            ),
            (
                Undefined,
                Undefined,
                is_known = false,
                is_hashable = false,
                size_class = Unsupported
            ),
        }
    };
}

#[macro_export]
macro_rules! data_type_registry {
    ($macro:ident) => {
        $crate::data_type_registry_entries!($macro)
    };
    ($macro:ident, $($args:tt)+) => {
        $crate::data_type_registry_entries!($macro, @args $($args)+)
    };
}

macro_rules! metadata_from_registry {
    ( @args $kind:expr; @entries $( ($data_type:ident, $family:ident, is_known = $is_known:expr, is_hashable = $is_hashable:expr, size_class = $size_class:ident $( ($width:expr) )? ) ),* $(,)? ) => {
        match $kind {
            $(
                $crate::DataType::$data_type => $crate::DataTypeMetadata {
                    family: $crate::DataTypeFamily::$family,
                    is_known: $is_known,
                    is_hashable: $is_hashable,
                    size_class: $crate::SizeClass::$size_class $( ($width) )?,
                },
            )*
        }
    };
}

macro_rules! all_types_from_registry {
    ( @entries $( ($data_type:ident, $family:ident, is_known = $is_known:expr, is_hashable = $is_hashable:expr, size_class = $size_class:ident $( ($width:expr) )? ) ),* $(,)? ) => {
        [ $( $crate::DataType::$data_type ),* ]
    };
}

macro_rules! name_from_registry {
    ( @args $kind:expr; @entries $( ($data_type:ident, $family:ident, is_known = $is_known:expr, is_hashable = $is_hashable:expr, size_class = $size_class:ident $( ($width:expr) )? ) ),* $(,)? ) => {
        match $kind {
            $(
                $crate::DataType::$data_type => stringify!($data_type),
            )*
        }
    };
}
