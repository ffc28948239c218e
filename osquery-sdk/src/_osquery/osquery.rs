//! Hand-maintained mirror of `osquery.thrift`.
//!
//! Field ids, method names, and container shapes must stay bit-exact with the
//! IDL shipped by osquery; the daemon speaks the binary protocol over a local
//! socket and rejects anything else. Keep this file free of SDK-level policy:
//! no retries, no locking, no timeouts.

use std::collections::BTreeMap;

use thrift::protocol::{
    field_id, verify_expected_message_type, verify_expected_sequence_number,
    verify_expected_service_call, TFieldIdentifier, TInputProtocol, TListIdentifier,
    TMapIdentifier, TMessageIdentifier, TMessageType, TOutputProtocol, TSerializable,
    TStructIdentifier, TType,
};
use thrift::server::TProcessor;
use thrift::{ApplicationError, ApplicationErrorKind};

pub type ExtensionRouteUUID = i64;
pub type ExtensionPluginRequest = BTreeMap<String, String>;
pub type ExtensionPluginResponse = Vec<BTreeMap<String, String>>;
pub type ExtensionRouteTable = BTreeMap<String, ExtensionPluginResponse>;
pub type ExtensionRegistry = BTreeMap<String, ExtensionRouteTable>;
pub type InternalExtensionList = BTreeMap<ExtensionRouteUUID, InternalExtensionInfo>;
pub type InternalOptionList = BTreeMap<String, InternalOptionInfo>;

//
// Data structs
//

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExtensionStatus {
    pub code: Option<i32>,
    pub message: Option<String>,
    pub uuid: Option<ExtensionRouteUUID>,
}

impl ExtensionStatus {
    pub fn new<F1, F2, F3>(code: F1, message: F2, uuid: F3) -> ExtensionStatus
    where
        F1: Into<Option<i32>>,
        F2: Into<Option<String>>,
        F3: Into<Option<ExtensionRouteUUID>>,
    {
        ExtensionStatus {
            code: code.into(),
            message: message.into(),
            uuid: uuid.into(),
        }
    }

    /// The canonical success status osquery expects from health checks.
    pub fn ok() -> ExtensionStatus {
        ExtensionStatus::new(0, "OK".to_string(), None)
    }
}

impl TSerializable for ExtensionStatus {
    fn read_from_in_protocol(i_prot: &mut dyn TInputProtocol) -> thrift::Result<ExtensionStatus> {
        i_prot.read_struct_begin()?;
        let mut code: Option<i32> = None;
        let mut message: Option<String> = None;
        let mut uuid: Option<ExtensionRouteUUID> = None;
        loop {
            let field_ident = i_prot.read_field_begin()?;
            if field_ident.field_type == TType::Stop {
                break;
            }
            match field_id(&field_ident)? {
                1 => code = Some(i_prot.read_i32()?),
                2 => message = Some(i_prot.read_string()?),
                3 => uuid = Some(i_prot.read_i64()?),
                _ => i_prot.skip(field_ident.field_type)?,
            }
            i_prot.read_field_end()?;
        }
        i_prot.read_struct_end()?;
        Ok(ExtensionStatus {
            code,
            message,
            uuid,
        })
    }

    fn write_to_out_protocol(&self, o_prot: &mut dyn TOutputProtocol) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("ExtensionStatus"))?;
        if let Some(code) = self.code {
            o_prot.write_field_begin(&TFieldIdentifier::new("code", TType::I32, 1))?;
            o_prot.write_i32(code)?;
            o_prot.write_field_end()?;
        }
        if let Some(ref message) = self.message {
            o_prot.write_field_begin(&TFieldIdentifier::new("message", TType::String, 2))?;
            o_prot.write_string(message)?;
            o_prot.write_field_end()?;
        }
        if let Some(uuid) = self.uuid {
            o_prot.write_field_begin(&TFieldIdentifier::new("uuid", TType::I64, 3))?;
            o_prot.write_i64(uuid)?;
            o_prot.write_field_end()?;
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExtensionResponse {
    pub status: Option<ExtensionStatus>,
    pub response: Option<ExtensionPluginResponse>,
}

impl ExtensionResponse {
    pub fn new(status: ExtensionStatus, response: ExtensionPluginResponse) -> ExtensionResponse {
        ExtensionResponse {
            status: Some(status),
            response: Some(response),
        }
    }
}

impl TSerializable for ExtensionResponse {
    fn read_from_in_protocol(i_prot: &mut dyn TInputProtocol) -> thrift::Result<ExtensionResponse> {
        i_prot.read_struct_begin()?;
        let mut status: Option<ExtensionStatus> = None;
        let mut response: Option<ExtensionPluginResponse> = None;
        loop {
            let field_ident = i_prot.read_field_begin()?;
            if field_ident.field_type == TType::Stop {
                break;
            }
            match field_id(&field_ident)? {
                1 => status = Some(ExtensionStatus::read_from_in_protocol(i_prot)?),
                2 => response = Some(read_plugin_response(i_prot)?),
                _ => i_prot.skip(field_ident.field_type)?,
            }
            i_prot.read_field_end()?;
        }
        i_prot.read_struct_end()?;
        Ok(ExtensionResponse { status, response })
    }

    fn write_to_out_protocol(&self, o_prot: &mut dyn TOutputProtocol) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("ExtensionResponse"))?;
        if let Some(ref status) = self.status {
            o_prot.write_field_begin(&TFieldIdentifier::new("status", TType::Struct, 1))?;
            status.write_to_out_protocol(o_prot)?;
            o_prot.write_field_end()?;
        }
        if let Some(ref response) = self.response {
            o_prot.write_field_begin(&TFieldIdentifier::new("response", TType::List, 2))?;
            write_plugin_response(response, o_prot)?;
            o_prot.write_field_end()?;
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct InternalExtensionInfo {
    pub name: Option<String>,
    pub version: Option<String>,
    pub sdk_version: Option<String>,
    pub min_sdk_version: Option<String>,
}

impl TSerializable for InternalExtensionInfo {
    fn read_from_in_protocol(
        i_prot: &mut dyn TInputProtocol,
    ) -> thrift::Result<InternalExtensionInfo> {
        i_prot.read_struct_begin()?;
        let mut info = InternalExtensionInfo::default();
        loop {
            let field_ident = i_prot.read_field_begin()?;
            if field_ident.field_type == TType::Stop {
                break;
            }
            match field_id(&field_ident)? {
                1 => info.name = Some(i_prot.read_string()?),
                2 => info.version = Some(i_prot.read_string()?),
                3 => info.sdk_version = Some(i_prot.read_string()?),
                4 => info.min_sdk_version = Some(i_prot.read_string()?),
                _ => i_prot.skip(field_ident.field_type)?,
            }
            i_prot.read_field_end()?;
        }
        i_prot.read_struct_end()?;
        Ok(info)
    }

    fn write_to_out_protocol(&self, o_prot: &mut dyn TOutputProtocol) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("InternalExtensionInfo"))?;
        let fields: [(&str, i16, &Option<String>); 4] = [
            ("name", 1, &self.name),
            ("version", 2, &self.version),
            ("sdk_version", 3, &self.sdk_version),
            ("min_sdk_version", 4, &self.min_sdk_version),
        ];
        for (name, id, value) in fields {
            if let Some(value) = value {
                o_prot.write_field_begin(&TFieldIdentifier::new(name, TType::String, id))?;
                o_prot.write_string(value)?;
                o_prot.write_field_end()?;
            }
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct InternalOptionInfo {
    pub value: Option<String>,
    pub default_value: Option<String>,
    pub type_: Option<String>,
}

impl TSerializable for InternalOptionInfo {
    fn read_from_in_protocol(
        i_prot: &mut dyn TInputProtocol,
    ) -> thrift::Result<InternalOptionInfo> {
        i_prot.read_struct_begin()?;
        let mut info = InternalOptionInfo::default();
        loop {
            let field_ident = i_prot.read_field_begin()?;
            if field_ident.field_type == TType::Stop {
                break;
            }
            match field_id(&field_ident)? {
                1 => info.value = Some(i_prot.read_string()?),
                2 => info.default_value = Some(i_prot.read_string()?),
                3 => info.type_ = Some(i_prot.read_string()?),
                _ => i_prot.skip(field_ident.field_type)?,
            }
            i_prot.read_field_end()?;
        }
        i_prot.read_struct_end()?;
        Ok(info)
    }

    fn write_to_out_protocol(&self, o_prot: &mut dyn TOutputProtocol) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("InternalOptionInfo"))?;
        let fields: [(&str, i16, &Option<String>); 3] = [
            ("value", 1, &self.value),
            ("default_value", 2, &self.default_value),
            ("type", 3, &self.type_),
        ];
        for (name, id, value) in fields {
            if let Some(value) = value {
                o_prot.write_field_begin(&TFieldIdentifier::new(name, TType::String, id))?;
                o_prot.write_string(value)?;
                o_prot.write_field_end()?;
            }
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

//
// Container helpers shared by structs, args, and results
//

fn write_string_map(
    map: &BTreeMap<String, String>,
    o_prot: &mut dyn TOutputProtocol,
) -> thrift::Result<()> {
    o_prot.write_map_begin(&TMapIdentifier::new(
        TType::String,
        TType::String,
        map.len() as i32,
    ))?;
    for (key, value) in map {
        o_prot.write_string(key)?;
        o_prot.write_string(value)?;
    }
    o_prot.write_map_end()
}

fn read_string_map(i_prot: &mut dyn TInputProtocol) -> thrift::Result<BTreeMap<String, String>> {
    let map_ident = i_prot.read_map_begin()?;
    let mut map = BTreeMap::new();
    for _ in 0..map_ident.size {
        let key = i_prot.read_string()?;
        let value = i_prot.read_string()?;
        map.insert(key, value);
    }
    i_prot.read_map_end()?;
    Ok(map)
}

fn write_plugin_response(
    rows: &ExtensionPluginResponse,
    o_prot: &mut dyn TOutputProtocol,
) -> thrift::Result<()> {
    o_prot.write_list_begin(&TListIdentifier::new(TType::Map, rows.len() as i32))?;
    for row in rows {
        write_string_map(row, o_prot)?;
    }
    o_prot.write_list_end()
}

fn read_plugin_response(
    i_prot: &mut dyn TInputProtocol,
) -> thrift::Result<ExtensionPluginResponse> {
    let list_ident = i_prot.read_list_begin()?;
    let mut rows = Vec::with_capacity(list_ident.size.max(0) as usize);
    for _ in 0..list_ident.size {
        rows.push(read_string_map(i_prot)?);
    }
    i_prot.read_list_end()?;
    Ok(rows)
}

fn write_route_table(
    table: &ExtensionRouteTable,
    o_prot: &mut dyn TOutputProtocol,
) -> thrift::Result<()> {
    o_prot.write_map_begin(&TMapIdentifier::new(
        TType::String,
        TType::List,
        table.len() as i32,
    ))?;
    for (name, routes) in table {
        o_prot.write_string(name)?;
        write_plugin_response(routes, o_prot)?;
    }
    o_prot.write_map_end()
}

fn read_route_table(i_prot: &mut dyn TInputProtocol) -> thrift::Result<ExtensionRouteTable> {
    let map_ident = i_prot.read_map_begin()?;
    let mut table = BTreeMap::new();
    for _ in 0..map_ident.size {
        let name = i_prot.read_string()?;
        let routes = read_plugin_response(i_prot)?;
        table.insert(name, routes);
    }
    i_prot.read_map_end()?;
    Ok(table)
}

fn write_registry(
    registry: &ExtensionRegistry,
    o_prot: &mut dyn TOutputProtocol,
) -> thrift::Result<()> {
    o_prot.write_map_begin(&TMapIdentifier::new(
        TType::String,
        TType::Map,
        registry.len() as i32,
    ))?;
    for (kind, table) in registry {
        o_prot.write_string(kind)?;
        write_route_table(table, o_prot)?;
    }
    o_prot.write_map_end()
}

fn read_registry(i_prot: &mut dyn TInputProtocol) -> thrift::Result<ExtensionRegistry> {
    let map_ident = i_prot.read_map_begin()?;
    let mut registry = BTreeMap::new();
    for _ in 0..map_ident.size {
        let kind = i_prot.read_string()?;
        let table = read_route_table(i_prot)?;
        registry.insert(kind, table);
    }
    i_prot.read_map_end()?;
    Ok(registry)
}

fn write_extension_list(
    list: &InternalExtensionList,
    o_prot: &mut dyn TOutputProtocol,
) -> thrift::Result<()> {
    o_prot.write_map_begin(&TMapIdentifier::new(
        TType::I64,
        TType::Struct,
        list.len() as i32,
    ))?;
    for (uuid, info) in list {
        o_prot.write_i64(*uuid)?;
        info.write_to_out_protocol(o_prot)?;
    }
    o_prot.write_map_end()
}

fn read_extension_list(i_prot: &mut dyn TInputProtocol) -> thrift::Result<InternalExtensionList> {
    let map_ident = i_prot.read_map_begin()?;
    let mut list = BTreeMap::new();
    for _ in 0..map_ident.size {
        let uuid = i_prot.read_i64()?;
        let info = InternalExtensionInfo::read_from_in_protocol(i_prot)?;
        list.insert(uuid, info);
    }
    i_prot.read_map_end()?;
    Ok(list)
}

fn write_option_list(
    list: &InternalOptionList,
    o_prot: &mut dyn TOutputProtocol,
) -> thrift::Result<()> {
    o_prot.write_map_begin(&TMapIdentifier::new(
        TType::String,
        TType::Struct,
        list.len() as i32,
    ))?;
    for (name, info) in list {
        o_prot.write_string(name)?;
        info.write_to_out_protocol(o_prot)?;
    }
    o_prot.write_map_end()
}

fn read_option_list(i_prot: &mut dyn TInputProtocol) -> thrift::Result<InternalOptionList> {
    let map_ident = i_prot.read_map_begin()?;
    let mut list = BTreeMap::new();
    for _ in 0..map_ident.size {
        let name = i_prot.read_string()?;
        let info = InternalOptionInfo::read_from_in_protocol(i_prot)?;
        list.insert(name, info);
    }
    i_prot.read_map_end()?;
    Ok(list)
}

fn write_empty_struct(name: &str, o_prot: &mut dyn TOutputProtocol) -> thrift::Result<()> {
    o_prot.write_struct_begin(&TStructIdentifier::new(name))?;
    o_prot.write_field_stop()?;
    o_prot.write_struct_end()
}

/// Reads a result struct whose only interesting member is the `success` field
/// (id 0), decoded by `read_success`.
fn read_result_struct<T>(
    i_prot: &mut dyn TInputProtocol,
    method: &str,
    read_success: impl Fn(&mut dyn TInputProtocol) -> thrift::Result<T>,
) -> thrift::Result<T> {
    i_prot.read_struct_begin()?;
    let mut success: Option<T> = None;
    loop {
        let field_ident = i_prot.read_field_begin()?;
        if field_ident.field_type == TType::Stop {
            break;
        }
        match field_id(&field_ident)? {
            0 => success = Some(read_success(i_prot)?),
            _ => i_prot.skip(field_ident.field_type)?,
        }
        i_prot.read_field_end()?;
    }
    i_prot.read_struct_end()?;
    success.ok_or_else(|| {
        thrift::Error::Application(ApplicationError::new(
            ApplicationErrorKind::MissingResult,
            format!("no result received for {method}"),
        ))
    })
}

fn read_void_result(i_prot: &mut dyn TInputProtocol) -> thrift::Result<()> {
    i_prot.read_struct_begin()?;
    loop {
        let field_ident = i_prot.read_field_begin()?;
        if field_ident.field_type == TType::Stop {
            break;
        }
        i_prot.skip(field_ident.field_type)?;
        i_prot.read_field_end()?;
    }
    i_prot.read_struct_end()
}

//
// Sync client
//

pub trait TExtensionSyncClient {
    fn ping(&mut self) -> thrift::Result<ExtensionStatus>;
    fn call(
        &mut self,
        registry: String,
        item: String,
        request: ExtensionPluginRequest,
    ) -> thrift::Result<ExtensionResponse>;
    fn shutdown(&mut self) -> thrift::Result<()>;
}

pub trait TExtensionManagerSyncClient: TExtensionSyncClient {
    fn extensions(&mut self) -> thrift::Result<InternalExtensionList>;
    fn options(&mut self) -> thrift::Result<InternalOptionList>;
    fn register_extension(
        &mut self,
        info: InternalExtensionInfo,
        registry: ExtensionRegistry,
    ) -> thrift::Result<ExtensionStatus>;
    fn deregister_extension(
        &mut self,
        uuid: ExtensionRouteUUID,
    ) -> thrift::Result<ExtensionStatus>;
    fn query(&mut self, sql: String) -> thrift::Result<ExtensionResponse>;
    fn get_query_columns(&mut self, sql: String) -> thrift::Result<ExtensionResponse>;
}

pub struct ExtensionManagerSyncClient<IP: TInputProtocol, OP: TOutputProtocol> {
    i_prot: IP,
    o_prot: OP,
    sequence_number: i32,
}

impl<IP: TInputProtocol, OP: TOutputProtocol> ExtensionManagerSyncClient<IP, OP> {
    pub fn new(input_protocol: IP, output_protocol: OP) -> ExtensionManagerSyncClient<IP, OP> {
        ExtensionManagerSyncClient {
            i_prot: input_protocol,
            o_prot: output_protocol,
            sequence_number: 0,
        }
    }

    fn send(
        &mut self,
        method: &str,
        write_args: impl FnOnce(&mut dyn TOutputProtocol) -> thrift::Result<()>,
    ) -> thrift::Result<()> {
        self.sequence_number += 1;
        let message_ident =
            TMessageIdentifier::new(method, TMessageType::Call, self.sequence_number);
        self.o_prot.write_message_begin(&message_ident)?;
        write_args(&mut self.o_prot)?;
        self.o_prot.write_message_end()?;
        self.o_prot.flush()
    }

    fn receive<T>(
        &mut self,
        method: &str,
        read_success: impl Fn(&mut dyn TInputProtocol) -> thrift::Result<T>,
    ) -> thrift::Result<T> {
        let message_ident = self.i_prot.read_message_begin()?;
        verify_expected_sequence_number(self.sequence_number, message_ident.sequence_number)?;
        verify_expected_service_call(method, &message_ident.name)?;
        if message_ident.message_type == TMessageType::Exception {
            let remote_error =
                thrift::Error::read_application_error_from_in_protocol(&mut self.i_prot)?;
            self.i_prot.read_message_end()?;
            return Err(thrift::Error::Application(remote_error));
        }
        verify_expected_message_type(TMessageType::Reply, message_ident.message_type)?;
        let result = read_result_struct(&mut self.i_prot, method, read_success)?;
        self.i_prot.read_message_end()?;
        Ok(result)
    }
}

impl<IP: TInputProtocol, OP: TOutputProtocol> TExtensionSyncClient
    for ExtensionManagerSyncClient<IP, OP>
{
    fn ping(&mut self) -> thrift::Result<ExtensionStatus> {
        self.send("ping", |o_prot| write_empty_struct("ping_args", o_prot))?;
        self.receive("ping", ExtensionStatus::read_from_in_protocol)
    }

    fn call(
        &mut self,
        registry: String,
        item: String,
        request: ExtensionPluginRequest,
    ) -> thrift::Result<ExtensionResponse> {
        self.send("call", |o_prot| {
            o_prot.write_struct_begin(&TStructIdentifier::new("call_args"))?;
            o_prot.write_field_begin(&TFieldIdentifier::new("registry", TType::String, 1))?;
            o_prot.write_string(&registry)?;
            o_prot.write_field_end()?;
            o_prot.write_field_begin(&TFieldIdentifier::new("item", TType::String, 2))?;
            o_prot.write_string(&item)?;
            o_prot.write_field_end()?;
            o_prot.write_field_begin(&TFieldIdentifier::new("request", TType::Map, 3))?;
            write_string_map(&request, o_prot)?;
            o_prot.write_field_end()?;
            o_prot.write_field_stop()?;
            o_prot.write_struct_end()
        })?;
        self.receive("call", ExtensionResponse::read_from_in_protocol)
    }

    fn shutdown(&mut self) -> thrift::Result<()> {
        self.send("shutdown", |o_prot| {
            write_empty_struct("shutdown_args", o_prot)
        })?;
        // The reply carries no success field; consume the result struct as-is.
        let message_ident = self.i_prot.read_message_begin()?;
        verify_expected_sequence_number(self.sequence_number, message_ident.sequence_number)?;
        verify_expected_service_call("shutdown", &message_ident.name)?;
        if message_ident.message_type == TMessageType::Exception {
            let remote_error =
                thrift::Error::read_application_error_from_in_protocol(&mut self.i_prot)?;
            self.i_prot.read_message_end()?;
            return Err(thrift::Error::Application(remote_error));
        }
        verify_expected_message_type(TMessageType::Reply, message_ident.message_type)?;
        read_void_result(&mut self.i_prot)?;
        self.i_prot.read_message_end()
    }
}

impl<IP: TInputProtocol, OP: TOutputProtocol> TExtensionManagerSyncClient
    for ExtensionManagerSyncClient<IP, OP>
{
    fn extensions(&mut self) -> thrift::Result<InternalExtensionList> {
        self.send("extensions", |o_prot| {
            write_empty_struct("extensions_args", o_prot)
        })?;
        self.receive("extensions", read_extension_list)
    }

    fn options(&mut self) -> thrift::Result<InternalOptionList> {
        self.send("options", |o_prot| {
            write_empty_struct("options_args", o_prot)
        })?;
        self.receive("options", read_option_list)
    }

    fn register_extension(
        &mut self,
        info: InternalExtensionInfo,
        registry: ExtensionRegistry,
    ) -> thrift::Result<ExtensionStatus> {
        self.send("registerExtension", |o_prot| {
            o_prot.write_struct_begin(&TStructIdentifier::new("registerExtension_args"))?;
            o_prot.write_field_begin(&TFieldIdentifier::new("info", TType::Struct, 1))?;
            info.write_to_out_protocol(o_prot)?;
            o_prot.write_field_end()?;
            o_prot.write_field_begin(&TFieldIdentifier::new("registry", TType::Map, 2))?;
            write_registry(&registry, o_prot)?;
            o_prot.write_field_end()?;
            o_prot.write_field_stop()?;
            o_prot.write_struct_end()
        })?;
        self.receive("registerExtension", ExtensionStatus::read_from_in_protocol)
    }

    fn deregister_extension(
        &mut self,
        uuid: ExtensionRouteUUID,
    ) -> thrift::Result<ExtensionStatus> {
        self.send("deregisterExtension", |o_prot| {
            o_prot.write_struct_begin(&TStructIdentifier::new("deregisterExtension_args"))?;
            o_prot.write_field_begin(&TFieldIdentifier::new("uuid", TType::I64, 1))?;
            o_prot.write_i64(uuid)?;
            o_prot.write_field_end()?;
            o_prot.write_field_stop()?;
            o_prot.write_struct_end()
        })?;
        self.receive(
            "deregisterExtension",
            ExtensionStatus::read_from_in_protocol,
        )
    }

    fn query(&mut self, sql: String) -> thrift::Result<ExtensionResponse> {
        self.send("query", |o_prot| {
            o_prot.write_struct_begin(&TStructIdentifier::new("query_args"))?;
            o_prot.write_field_begin(&TFieldIdentifier::new("sql", TType::String, 1))?;
            o_prot.write_string(&sql)?;
            o_prot.write_field_end()?;
            o_prot.write_field_stop()?;
            o_prot.write_struct_end()
        })?;
        self.receive("query", ExtensionResponse::read_from_in_protocol)
    }

    fn get_query_columns(&mut self, sql: String) -> thrift::Result<ExtensionResponse> {
        self.send("getQueryColumns", |o_prot| {
            o_prot.write_struct_begin(&TStructIdentifier::new("getQueryColumns_args"))?;
            o_prot.write_field_begin(&TFieldIdentifier::new("sql", TType::String, 1))?;
            o_prot.write_string(&sql)?;
            o_prot.write_field_end()?;
            o_prot.write_field_stop()?;
            o_prot.write_struct_end()
        })?;
        self.receive("getQueryColumns", ExtensionResponse::read_from_in_protocol)
    }
}

//
// Sync processor
//

pub trait ExtensionSyncHandler {
    fn handle_ping(&self) -> thrift::Result<ExtensionStatus>;
    fn handle_call(
        &self,
        registry: String,
        item: String,
        request: ExtensionPluginRequest,
    ) -> thrift::Result<ExtensionResponse>;
    fn handle_shutdown(&self) -> thrift::Result<()>;
}

pub trait ExtensionManagerSyncHandler {
    fn handle_extensions(&self) -> thrift::Result<InternalExtensionList>;
    fn handle_options(&self) -> thrift::Result<InternalOptionList>;
    fn handle_register_extension(
        &self,
        info: InternalExtensionInfo,
        registry: ExtensionRegistry,
    ) -> thrift::Result<ExtensionStatus>;
    fn handle_deregister_extension(
        &self,
        uuid: ExtensionRouteUUID,
    ) -> thrift::Result<ExtensionStatus>;
    fn handle_query(&self, sql: String) -> thrift::Result<ExtensionResponse>;
    fn handle_get_query_columns(&self, sql: String) -> thrift::Result<ExtensionResponse>;
}

pub struct ExtensionManagerSyncProcessor<H: ExtensionSyncHandler + ExtensionManagerSyncHandler> {
    handler: H,
}

/// Consumes a fully-read args struct that carries no fields we care about.
fn read_empty_args(i_prot: &mut dyn TInputProtocol) -> thrift::Result<()> {
    read_void_result(i_prot)
}

fn write_reply(
    method: &str,
    sequence_number: i32,
    o_prot: &mut dyn TOutputProtocol,
    write_result: impl FnOnce(&mut dyn TOutputProtocol) -> thrift::Result<()>,
) -> thrift::Result<()> {
    let message_ident = TMessageIdentifier::new(method, TMessageType::Reply, sequence_number);
    o_prot.write_message_begin(&message_ident)?;
    write_result(o_prot)?;
    o_prot.write_message_end()?;
    o_prot.flush()
}

fn write_exception(
    method: &str,
    sequence_number: i32,
    error: thrift::Error,
    o_prot: &mut dyn TOutputProtocol,
) -> thrift::Result<()> {
    let application_error = match error {
        thrift::Error::Application(application_error) => application_error,
        other => ApplicationError::new(ApplicationErrorKind::Unknown, other.to_string()),
    };
    let message_ident = TMessageIdentifier::new(method, TMessageType::Exception, sequence_number);
    o_prot.write_message_begin(&message_ident)?;
    thrift::Error::write_application_error_to_out_protocol(&application_error, o_prot)?;
    o_prot.write_message_end()?;
    o_prot.flush()
}

/// Writes a single-field result struct whose `success` member (id 0) is
/// produced by `write_success`.
fn write_success_result(
    struct_name: &str,
    success_type: TType,
    o_prot: &mut dyn TOutputProtocol,
    write_success: impl FnOnce(&mut dyn TOutputProtocol) -> thrift::Result<()>,
) -> thrift::Result<()> {
    o_prot.write_struct_begin(&TStructIdentifier::new(struct_name))?;
    o_prot.write_field_begin(&TFieldIdentifier::new("success", success_type, 0))?;
    write_success(o_prot)?;
    o_prot.write_field_end()?;
    o_prot.write_field_stop()?;
    o_prot.write_struct_end()
}

impl<H: ExtensionSyncHandler + ExtensionManagerSyncHandler> ExtensionManagerSyncProcessor<H> {
    pub fn new(handler: H) -> ExtensionManagerSyncProcessor<H> {
        ExtensionManagerSyncProcessor { handler }
    }

    fn process_ping(
        &self,
        sequence_number: i32,
        i_prot: &mut dyn TInputProtocol,
        o_prot: &mut dyn TOutputProtocol,
    ) -> thrift::Result<()> {
        read_empty_args(i_prot)?;
        match self.handler.handle_ping() {
            Ok(status) => write_reply("ping", sequence_number, o_prot, |o_prot| {
                write_success_result("ping_result", TType::Struct, o_prot, |o_prot| {
                    status.write_to_out_protocol(o_prot)
                })
            }),
            Err(error) => write_exception("ping", sequence_number, error, o_prot),
        }
    }

    fn process_call(
        &self,
        sequence_number: i32,
        i_prot: &mut dyn TInputProtocol,
        o_prot: &mut dyn TOutputProtocol,
    ) -> thrift::Result<()> {
        i_prot.read_struct_begin()?;
        let mut registry: Option<String> = None;
        let mut item: Option<String> = None;
        let mut request: Option<ExtensionPluginRequest> = None;
        loop {
            let field_ident = i_prot.read_field_begin()?;
            if field_ident.field_type == TType::Stop {
                break;
            }
            match field_id(&field_ident)? {
                1 => registry = Some(i_prot.read_string()?),
                2 => item = Some(i_prot.read_string()?),
                3 => request = Some(read_string_map(i_prot)?),
                _ => i_prot.skip(field_ident.field_type)?,
            }
            i_prot.read_field_end()?;
        }
        i_prot.read_struct_end()?;

        let outcome = self.handler.handle_call(
            registry.unwrap_or_default(),
            item.unwrap_or_default(),
            request.unwrap_or_default(),
        );
        match outcome {
            Ok(response) => write_reply("call", sequence_number, o_prot, |o_prot| {
                write_success_result("call_result", TType::Struct, o_prot, |o_prot| {
                    response.write_to_out_protocol(o_prot)
                })
            }),
            Err(error) => write_exception("call", sequence_number, error, o_prot),
        }
    }

    fn process_shutdown(
        &self,
        sequence_number: i32,
        i_prot: &mut dyn TInputProtocol,
        o_prot: &mut dyn TOutputProtocol,
    ) -> thrift::Result<()> {
        read_empty_args(i_prot)?;
        match self.handler.handle_shutdown() {
            Ok(()) => write_reply("shutdown", sequence_number, o_prot, |o_prot| {
                write_empty_struct("shutdown_result", o_prot)
            }),
            Err(error) => write_exception("shutdown", sequence_number, error, o_prot),
        }
    }

    fn process_extensions(
        &self,
        sequence_number: i32,
        i_prot: &mut dyn TInputProtocol,
        o_prot: &mut dyn TOutputProtocol,
    ) -> thrift::Result<()> {
        read_empty_args(i_prot)?;
        match self.handler.handle_extensions() {
            Ok(list) => write_reply("extensions", sequence_number, o_prot, |o_prot| {
                write_success_result("extensions_result", TType::Map, o_prot, |o_prot| {
                    write_extension_list(&list, o_prot)
                })
            }),
            Err(error) => write_exception("extensions", sequence_number, error, o_prot),
        }
    }

    fn process_options(
        &self,
        sequence_number: i32,
        i_prot: &mut dyn TInputProtocol,
        o_prot: &mut dyn TOutputProtocol,
    ) -> thrift::Result<()> {
        read_empty_args(i_prot)?;
        match self.handler.handle_options() {
            Ok(list) => write_reply("options", sequence_number, o_prot, |o_prot| {
                write_success_result("options_result", TType::Map, o_prot, |o_prot| {
                    write_option_list(&list, o_prot)
                })
            }),
            Err(error) => write_exception("options", sequence_number, error, o_prot),
        }
    }

    fn process_register_extension(
        &self,
        sequence_number: i32,
        i_prot: &mut dyn TInputProtocol,
        o_prot: &mut dyn TOutputProtocol,
    ) -> thrift::Result<()> {
        i_prot.read_struct_begin()?;
        let mut info: Option<InternalExtensionInfo> = None;
        let mut registry: Option<ExtensionRegistry> = None;
        loop {
            let field_ident = i_prot.read_field_begin()?;
            if field_ident.field_type == TType::Stop {
                break;
            }
            match field_id(&field_ident)? {
                1 => info = Some(InternalExtensionInfo::read_from_in_protocol(i_prot)?),
                2 => registry = Some(read_registry(i_prot)?),
                _ => i_prot.skip(field_ident.field_type)?,
            }
            i_prot.read_field_end()?;
        }
        i_prot.read_struct_end()?;

        let outcome = self
            .handler
            .handle_register_extension(info.unwrap_or_default(), registry.unwrap_or_default());
        match outcome {
            Ok(status) => write_reply("registerExtension", sequence_number, o_prot, |o_prot| {
                write_success_result("registerExtension_result", TType::Struct, o_prot, |o_prot| {
                    status.write_to_out_protocol(o_prot)
                })
            }),
            Err(error) => write_exception("registerExtension", sequence_number, error, o_prot),
        }
    }

    fn process_deregister_extension(
        &self,
        sequence_number: i32,
        i_prot: &mut dyn TInputProtocol,
        o_prot: &mut dyn TOutputProtocol,
    ) -> thrift::Result<()> {
        i_prot.read_struct_begin()?;
        let mut uuid: Option<ExtensionRouteUUID> = None;
        loop {
            let field_ident = i_prot.read_field_begin()?;
            if field_ident.field_type == TType::Stop {
                break;
            }
            match field_id(&field_ident)? {
                1 => uuid = Some(i_prot.read_i64()?),
                _ => i_prot.skip(field_ident.field_type)?,
            }
            i_prot.read_field_end()?;
        }
        i_prot.read_struct_end()?;

        match self
            .handler
            .handle_deregister_extension(uuid.unwrap_or_default())
        {
            Ok(status) => write_reply("deregisterExtension", sequence_number, o_prot, |o_prot| {
                write_success_result(
                    "deregisterExtension_result",
                    TType::Struct,
                    o_prot,
                    |o_prot| status.write_to_out_protocol(o_prot),
                )
            }),
            Err(error) => write_exception("deregisterExtension", sequence_number, error, o_prot),
        }
    }

    fn read_sql_args(i_prot: &mut dyn TInputProtocol) -> thrift::Result<String> {
        i_prot.read_struct_begin()?;
        let mut sql: Option<String> = None;
        loop {
            let field_ident = i_prot.read_field_begin()?;
            if field_ident.field_type == TType::Stop {
                break;
            }
            match field_id(&field_ident)? {
                1 => sql = Some(i_prot.read_string()?),
                _ => i_prot.skip(field_ident.field_type)?,
            }
            i_prot.read_field_end()?;
        }
        i_prot.read_struct_end()?;
        Ok(sql.unwrap_or_default())
    }

    fn process_query(
        &self,
        sequence_number: i32,
        i_prot: &mut dyn TInputProtocol,
        o_prot: &mut dyn TOutputProtocol,
    ) -> thrift::Result<()> {
        let sql = Self::read_sql_args(i_prot)?;
        match self.handler.handle_query(sql) {
            Ok(response) => write_reply("query", sequence_number, o_prot, |o_prot| {
                write_success_result("query_result", TType::Struct, o_prot, |o_prot| {
                    response.write_to_out_protocol(o_prot)
                })
            }),
            Err(error) => write_exception("query", sequence_number, error, o_prot),
        }
    }

    fn process_get_query_columns(
        &self,
        sequence_number: i32,
        i_prot: &mut dyn TInputProtocol,
        o_prot: &mut dyn TOutputProtocol,
    ) -> thrift::Result<()> {
        let sql = Self::read_sql_args(i_prot)?;
        match self.handler.handle_get_query_columns(sql) {
            Ok(response) => write_reply("getQueryColumns", sequence_number, o_prot, |o_prot| {
                write_success_result("getQueryColumns_result", TType::Struct, o_prot, |o_prot| {
                    response.write_to_out_protocol(o_prot)
                })
            }),
            Err(error) => write_exception("getQueryColumns", sequence_number, error, o_prot),
        }
    }
}

impl<H: ExtensionSyncHandler + ExtensionManagerSyncHandler> TProcessor
    for ExtensionManagerSyncProcessor<H>
{
    fn process(
        &self,
        i_prot: &mut dyn TInputProtocol,
        o_prot: &mut dyn TOutputProtocol,
    ) -> thrift::Result<()> {
        let message_ident = i_prot.read_message_begin()?;
        let sequence_number = message_ident.sequence_number;
        let res = match &*message_ident.name {
            "ping" => self.process_ping(sequence_number, i_prot, o_prot),
            "call" => self.process_call(sequence_number, i_prot, o_prot),
            "shutdown" => self.process_shutdown(sequence_number, i_prot, o_prot),
            "extensions" => self.process_extensions(sequence_number, i_prot, o_prot),
            "options" => self.process_options(sequence_number, i_prot, o_prot),
            "registerExtension" => self.process_register_extension(sequence_number, i_prot, o_prot),
            "deregisterExtension" => {
                self.process_deregister_extension(sequence_number, i_prot, o_prot)
            }
            "query" => self.process_query(sequence_number, i_prot, o_prot),
            "getQueryColumns" => self.process_get_query_columns(sequence_number, i_prot, o_prot),
            method => Err(thrift::Error::Application(ApplicationError::new(
                ApplicationErrorKind::UnknownMethod,
                format!("unknown method {method}"),
            ))),
        };
        thrift::server::handle_process_result(&message_ident, res, o_prot)
    }
}
