/* ************************************************************************ **
** This file is part of ljcap, and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
**                                                                          **
** Be aware that not all of ljcap is provided under this permissive license,**
** and that the project as a whole is licensed under the GPL 3.0.           **
** ************************************************************************ */

/// Fieldless enums that mirror integer codes of a C API.
macro_rules! c_enums {
    (
        $(
            $(#[$meta:meta])*
            [$($vis:tt)*] enum $Type:ident {
                // tt so it can double as expr and pat
                $($(#[$vmeta:meta])* $Variant:ident = $value:tt,)+
            }
        )+
    ) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
            #[repr(u32)]
            $($vis)* enum $Type {
                $($(#[$vmeta])* $Variant = $value,)+
            }

            impl $Type {
                #[allow(unused)]
                pub fn from_int(x: u32) -> crate::FailResult<$Type>
                { match x {
                    $($value => Ok($Type::$Variant),)+
                    _ => bail!("Invalid value {} for {}", x, stringify!($Type)),
                }}

                #[allow(unused)]
                pub fn to_int(self) -> u32 { self as u32 }
            }
        )+
    };
}
