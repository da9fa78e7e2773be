/*
 * nodebooks-kernel
 *
 * Copyright (C) 2024-2026 NodeBooks Contributors
 * SPDX-License-Identifier: GPL-3.0-only
 *
 * This library is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, version 3.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Network module wrappers: client surfaces stay intact, server-creation
//! members are replaced with stubs that raise policy denials, and datagram
//! sockets refuse to bind or join multicast groups.

use crate::runtime::value::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetKind {
    Http,
    Https,
    Http2,
    Net,
    Tls,
}

impl NetKind {
    fn module_name(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Http2 => "http2",
            Self::Net => "net",
            Self::Tls => "tls",
        }
    }

    fn server_members(&self) -> &'static [&'static str] {
        match self {
            Self::Http | Self::Https => &["createServer", "Server"],
            Self::Http2 => &["createServer", "createSecureServer", "Http2Server"],
            Self::Net => &["createServer", "Server"],
            Self::Tls => &["createServer", "Server"],
        }
    }
}

/// The wrapped module handed to user code: the base module with its
/// server-creation members swapped for denial stubs.
pub fn net_module(kind: NetKind) -> Value {
    let module = base_module(kind);

    if let Value::Object(obj) = &module {
        let mut obj = obj.borrow_mut();

        for member in kind.server_members() {
            let name = format!("{}.{member}", kind.module_name());

            obj.props.insert((*member).into(), Value::native(*member, move |_, _, _| {
                Err(policy_error(&format!("{name} is not allowed in notebooks")))
            }));
        }
    }

    module
}

fn base_module(kind: NetKind) -> Value {
    let mut module = Obj::new();

    match kind {
        NetKind::Http | NetKind::Https => {
            module.props.insert("request".into(), Value::native("request", |_, _, _| Ok(client_request())));
            module.props.insert("get".into(), Value::native("get", |_, _, _| Ok(client_request())));
            module.props.insert("Agent".into(), Value::native("Agent", |_, _, _| Ok(Value::object(Obj::new()))));
            module.props.insert("createServer".into(), Value::native("createServer", |_, _, _| Ok(Value::object(Obj::new()))));
            module.props.insert("Server".into(), Value::native("Server", |_, _, _| Ok(Value::object(Obj::new()))));
        }
        NetKind::Http2 => {
            module.props.insert("connect".into(), Value::native("connect", |_, _, _| Ok(client_socket())));
            module.props.insert("createServer".into(), Value::native("createServer", |_, _, _| Ok(Value::object(Obj::new()))));
            module
                .props
                .insert("createSecureServer".into(), Value::native("createSecureServer", |_, _, _| Ok(Value::object(Obj::new()))));
        }
        NetKind::Net | NetKind::Tls => {
            module.props.insert("connect".into(), Value::native("connect", |_, _, _| Ok(client_socket())));
            module
                .props
                .insert("createConnection".into(), Value::native("createConnection", |_, _, _| Ok(client_socket())));
            module.props.insert("Socket".into(), Value::native("Socket", |_, _, _| Ok(client_socket())));
            module.props.insert("createServer".into(), Value::native("createServer", |_, _, _| Ok(Value::object(Obj::new()))));
            module.props.insert("Server".into(), Value::native("Server", |_, _, _| Ok(Value::object(Obj::new()))));
        }
    }

    if kind == NetKind::Tls {
        module
            .props
            .insert("createSecureContext".into(), Value::native("createSecureContext", |_, _, _| Ok(Value::object(Obj::new()))));
    }

    Value::object(module)
}

pub fn dgram_module() -> Value {
    let mut module = Obj::new();

    module.props.insert("createSocket".into(), Value::native("createSocket", |_, _, _| Ok(dgram_socket())));
    Value::object(module)
}

const DGRAM_DENIED: &[&str] = &["bind", "addMembership", "setMulticastTTL", "addSourceSpecificMembership", "dropSourceSpecificMembership"];

fn dgram_socket() -> Value {
    let mut socket = Obj::new();

    for denied in DGRAM_DENIED {
        socket.props.insert((*denied).into(), Value::native(*denied, move |_, _, _| {
            Err(policy_error(&format!("dgram socket {denied} is not allowed in notebooks")))
        }));
    }

    for passthrough in ["send", "close", "unref", "ref", "setTTL"] {
        socket.props.insert(passthrough.into(), Value::native(passthrough, |interp, _, args| {
            /* A trailing callback is honored so caller code proceeds. */
            if let Some(callback) = args.last() {
                if callback.is_callable() {
                    interp.call_value(callback, &Value::Undefined, &[Value::Null])?;
                }
            }

            Ok(Value::Undefined)
        }));
    }

    socket.props.insert("on".into(), Value::native("on", |_, this, _| Ok(this.clone())));
    socket.props.insert("once".into(), Value::native("once", |_, this, _| Ok(this.clone())));
    Value::object(socket)
}

fn client_request() -> Value {
    let mut request = Obj::new();

    for chainable in ["on", "once", "setHeader", "write", "end", "abort", "destroy"] {
        request.props.insert(chainable.into(), Value::native(chainable, |_, this, _| Ok(this.clone())));
    }

    Value::object(request)
}

fn client_socket() -> Value {
    let mut socket = Obj::new();

    for chainable in ["on", "once", "write", "end", "destroy", "setEncoding"] {
        socket.props.insert(chainable.into(), Value::native(chainable, |_, this, _| Ok(this.clone())));
    }

    Value::object(socket)
}

#[cfg(test)]
mod test {
    use crate::runtime::value::Value;
    use crate::sandbox::net::*;

    fn member(module: &Value, name: &str) -> Value {
        match module {
            Value::Object(obj) => obj.borrow().props.get(name).cloned().unwrap_or(Value::Undefined),
            _ => Value::Undefined,
        }
    }

    #[test]
    fn client_members_remain_callable() {
        for kind in [NetKind::Http, NetKind::Https] {
            assert!(member(&net_module(kind), "request").is_callable());
            assert!(member(&net_module(kind), "get").is_callable());
        }

        assert!(member(&net_module(NetKind::Net), "connect").is_callable());
        assert!(member(&net_module(NetKind::Tls), "connect").is_callable());
    }

    #[test]
    fn server_members_are_replaced() {
        /* The wrapper swaps in stubs; invoking them is exercised in the
         * kernel scenario tests. */
        for kind in [NetKind::Http, NetKind::Https, NetKind::Http2, NetKind::Net, NetKind::Tls] {
            for name in kind.server_members() {
                assert!(member(&net_module(kind), name).is_callable());
            }
        }
    }
}
