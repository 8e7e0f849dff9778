//! Export macro for plugin crates.

/// Export the symbols the Kedge loader resolves from a plugin library.
///
/// The argument is an expression constructing the plugin value; it is
/// evaluated once per `kedge_plugin_create` call. The factory-function
/// shape (rather than an exported static) keeps construction on the
/// loading side of the boundary and lets a module refuse to construct by
/// returning null.
///
/// # Usage
/// ```ignore
/// kedge_plugin_sdk::export_plugin!(MyPlugin::new());
/// ```
#[macro_export]
macro_rules! export_plugin {
    ($constructor:expr) => {
        #[no_mangle]
        pub extern "C" fn kedge_plugin_abi_version() -> u32 {
            $crate::PLUGIN_ABI_VERSION
        }

        #[no_mangle]
        pub extern "C" fn kedge_plugin_create() -> *mut $crate::PluginHandle {
            let plugin: $crate::PluginHandle = Box::new($constructor);
            Box::into_raw(Box::new(plugin))
        }

        /// # Safety
        /// `handle` must be a pointer returned by `kedge_plugin_create`
        /// that has not already been destroyed.
        #[no_mangle]
        pub unsafe extern "C" fn kedge_plugin_destroy(handle: *mut $crate::PluginHandle) {
            if !handle.is_null() {
                drop(Box::from_raw(handle));
            }
        }
    };
}
