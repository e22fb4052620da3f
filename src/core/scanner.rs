//! 词法扫描模块
//!
//! 基于 `quick-xml` 读取缓冲区视图开头的一个XML事件，只识别StartTLS协商需要的
//! 少量元素，不构建DOM。视图不足以判断时返回 [`Token::Incomplete`] 且不消费任何
//! 字节，调用方等待更多数据后在同一前缀上再次扫描，以此容忍TCP分段把标签切开。
//!
//! [`Scanner`] 按方向保存两类状态：流头上声明的命名空间前缀，以及未完成标记的
//! 续扫位置。对端逐字节发送一个永不闭合的标签时，每个新字节只检查一次。

use crate::core::protocol::{NS_STREAMS, NS_TLS};
use memchr::memmem;
use quick_xml::errors::{Error as XmlError, SyntaxError};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{PrefixDeclaration, QName};
use quick_xml::Reader;
use std::collections::HashMap;

/// 词法单元
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// `<stream:stream ...>` 流头
    StreamOpen,
    /// TLS命名空间下的 `<starttls>` 元素
    StartTlsRequest,
    /// `<proceed>` 元素
    ProceedResponse,
    /// TLS命名空间下的 `<failure>` 元素
    FailureResponse,
    /// 流命名空间下的 `<features>` 开始标签
    FeaturesOpen,
    /// `<features>` 的结束标签
    FeaturesClose,
    /// XML声明、处理指令、注释或DOCTYPE
    Prolog,
    /// 标签之间的字符数据
    Text {
        /// 是否只包含空白
        blank: bool,
    },
    /// 其他任意元素标记
    OtherElement,
    /// 永远无法成为合法标签的标记
    Malformed,
    /// 需要更多数据
    Incomplete,
}

impl Token {
    /// 是否为协商相关的关键元素
    pub fn is_significant(&self) -> bool {
        matches!(
            self,
            Self::StreamOpen
                | Self::StartTlsRequest
                | Self::ProceedResponse
                | Self::FailureResponse
                | Self::FeaturesOpen
                | Self::FeaturesClose
        )
    }
}

/// 扫描视图开头的一个词法单元
///
/// 不带流头的命名空间上下文，前缀只能由同一标签上的声明解析。返回词法单元和它
/// 占用的字节数；除 `Incomplete` 外，返回的字节数总是大于零。
pub fn scan(view: &[u8]) -> (Token, usize) {
    Scanner::new().scan(view)
}

/// 单方向扫描器
///
/// 调用约定：两次 `scan` 之间视图只能在尾部追加数据；返回 `Incomplete` 以外的
/// 结果后，调用方可以消费返回的字节数，也可以原样保留视图。
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    /// 流头上的命名空间声明
    stream: Bindings,
    pending: Option<Pending>,
    bytes_examined: u64,
}

/// 上一次扫描停在哪里
#[derive(Debug, Clone)]
struct Pending {
    /// 下一次从视图的这个位置继续解析
    resume_at: usize,
    /// 正在读取内容的协商元素
    element: Option<OpenElement>,
    /// 未闭合标记的终止符检查
    gate: Option<Gate>,
}

#[derive(Debug, Clone)]
struct OpenElement {
    token: Token,
    qname: Vec<u8>,
    depth: usize,
}

/// 只有新到达的字节里可能出现终止符时，才值得重新交给解析器
#[derive(Debug, Clone, Copy)]
struct Gate {
    checked: usize,
    kind: GateKind,
}

#[derive(Debug, Clone, Copy)]
enum GateKind {
    /// 开始标签：引号外的 `>`
    Tag { quote: Option<u8> },
    /// 注释、CDATA、处理指令、结束标签和DOCTYPE的终止序列
    Until(&'static [u8]),
}

impl Gate {
    /// 为视图中 `start` 处的未闭合标记建立检查；类型还无法判断时返回 `None`
    fn for_markup(view: &[u8], start: usize) -> Option<Self> {
        let markup = view.get(start..)?;
        let kind = match markup.get(1).copied()? {
            b'?' => GateKind::Until(b"?>"),
            b'/' => GateKind::Until(b">"),
            b'!' => match markup.get(2).copied()? {
                b'-' => GateKind::Until(b"-->"),
                b'[' => GateKind::Until(b"]]>"),
                _ => GateKind::Until(b">"),
            },
            _ => GateKind::Tag { quote: None },
        };
        Some(Self {
            checked: start + 1,
            kind,
        })
    }

    /// 检查自上次以来新增的字节，可能已经闭合时返回 `true`
    fn advance(&mut self, view: &[u8], examined: &mut u64) -> bool {
        let from = self.checked.min(view.len());
        let fresh = &view[from..];
        *examined += fresh.len() as u64;

        let ready = match &mut self.kind {
            GateKind::Tag { quote } => {
                let mut closed = false;
                // 与解析器一致：引号内的 `>` 不结束标签
                for i in memchr::memchr3_iter(b'>', b'\'', b'"', fresh) {
                    match (*quote, fresh[i]) {
                        (None, b'>') => {
                            closed = true;
                            break;
                        }
                        (None, q) => *quote = Some(q),
                        (Some(q), b) if b == q => *quote = None,
                        _ => {}
                    }
                }
                closed
            }
            GateKind::Until(terminator) => {
                let terminator: &[u8] = terminator;
                // 终止符可能跨越上次检查的边界
                let overlap = from.saturating_sub(terminator.len() - 1);
                memmem::find(&view[overlap..], terminator).is_some()
            }
        };
        self.checked = view.len();
        ready
    }
}

/// 一个标签上（或流头上）的命名空间声明
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Bindings {
    default: Option<Vec<u8>>,
    named: HashMap<Vec<u8>, Vec<u8>>,
}

impl Bindings {
    /// 属性语法错误时返回 `None`
    fn from_tag(tag: &BytesStart<'_>) -> Option<Self> {
        let mut bindings = Self::default();
        for attr in tag.attributes() {
            let attr = attr.ok()?;
            match attr.key.as_namespace_binding() {
                Some(PrefixDeclaration::Default) => {
                    bindings.default = Some(attr.value.into_owned());
                }
                Some(PrefixDeclaration::Named(prefix)) => {
                    bindings.named.insert(prefix.to_vec(), attr.value.into_owned());
                }
                None => {}
            }
        }
        Some(bindings)
    }

    fn prefix(&self, prefix: &[u8]) -> Option<&[u8]> {
        self.named.get(prefix).map(Vec::as_slice)
    }
}

impl Scanner {
    /// 创建新的扫描器
    pub fn new() -> Self {
        Self::default()
    }

    /// 扫描视图开头的一个词法单元
    ///
    /// 与 [`scan`] 相同，另外会记住流头上声明的前缀，并从上次未完成的位置继续。
    pub fn scan(&mut self, view: &[u8]) -> (Token, usize) {
        let Some(mut pending) = self.pending.take() else {
            return self.scan_fresh(view);
        };
        let shrunk = pending.resume_at > view.len()
            || pending.gate.map_or(false, |gate| gate.checked > view.len());
        if shrunk {
            return self.scan_fresh(view);
        }

        if let Some(gate) = pending.gate.as_mut() {
            if !gate.advance(view, &mut self.bytes_examined) {
                self.pending = Some(pending);
                return (Token::Incomplete, 0);
            }
            pending.gate = None;
        }

        match pending.element {
            Some(element) => self.read_element_content(view, pending.resume_at, element),
            None => self.scan_fresh(view),
        }
    }

    /// 累计检查过的字节数
    pub fn bytes_examined(&self) -> u64 {
        self.bytes_examined
    }

    fn scan_fresh(&mut self, view: &[u8]) -> (Token, usize) {
        let Some(&first) = view.first() else {
            return (Token::Incomplete, 0);
        };

        // 前导空白单独成块，非空白文本的起点与分段方式无关
        if is_xml_space(first) {
            let end = view.iter().position(|&b| !is_xml_space(b)).unwrap_or(view.len());
            self.bytes_examined += end as u64;
            return (Token::Text { blank: true }, end);
        }
        match check_markup(view) {
            MarkupStart::Malformed => return (Token::Malformed, 1),
            MarkupStart::Undecided => return (Token::Incomplete, 0),
            MarkupStart::Plausible => {}
        }

        let mut reader = xml_reader(view);
        let event = reader.read_event();
        let end = reader.buffer_position() as usize;
        let parsed = if event.is_ok() { end } else { view.len() };
        self.bytes_examined += parsed as u64;

        match event {
            Ok(Event::Text(_)) | Ok(Event::CData(_)) => (Token::Text { blank: false }, end),
            Ok(Event::Decl(_)) | Ok(Event::PI(_)) | Ok(Event::Comment(_)) | Ok(Event::DocType(_)) => {
                (Token::Prolog, end)
            }
            Ok(Event::Start(tag)) => self.on_start_tag(view, &tag, end, false),
            Ok(Event::Empty(tag)) => self.on_start_tag(view, &tag, end, true),
            Ok(Event::End(tag)) => (self.classify_end(tag.name()), end),
            Ok(Event::Eof) => (Token::Incomplete, 0),
            Err(e) if is_unclosed(&e) => {
                self.suspend(view, 0, None);
                (Token::Incomplete, 0)
            }
            Err(_) => (Token::Malformed, 1),
        }
    }

    fn on_start_tag(&mut self, view: &[u8], tag: &BytesStart<'_>, end: usize, empty: bool) -> (Token, usize) {
        let Some(local) = Bindings::from_tag(tag) else {
            return (Token::Malformed, 1);
        };
        let name = tag.name();
        let token = self.classify_start(name, &local, empty);

        match token {
            Token::StreamOpen => {
                self.stream = local;
                (token, end)
            }
            // 非空形式的协商元素要吃到结束标签为止，偏移才能落在元素之后
            Token::StartTlsRequest | Token::ProceedResponse | Token::FailureResponse if !empty => {
                let element = OpenElement {
                    token,
                    qname: name.as_ref().to_vec(),
                    depth: 0,
                };
                self.read_element_content(view, end, element)
            }
            _ => (token, end),
        }
    }

    /// 从 `resume_at` 开始读取协商元素的内容，直到与之配对的结束标签
    fn read_element_content(&mut self, view: &[u8], mut resume_at: usize, mut element: OpenElement) -> (Token, usize) {
        loop {
            let rest = &view[resume_at..];
            match check_markup(rest) {
                MarkupStart::Malformed => return (Token::Malformed, 1),
                MarkupStart::Undecided => {
                    self.pending = Some(Pending {
                        resume_at,
                        element: Some(element),
                        gate: None,
                    });
                    return (Token::Incomplete, 0);
                }
                MarkupStart::Plausible => {}
            }

            let mut reader = xml_reader(rest);
            let event = reader.read_event();
            let consumed = reader.buffer_position() as usize;

            match event {
                Err(e) if is_unclosed(&e) => {
                    self.bytes_examined += rest.len() as u64;
                    self.suspend(view, resume_at, Some(element));
                    return (Token::Incomplete, 0);
                }
                Err(_) => return (Token::Malformed, 1),
                Ok(Event::Eof) => {
                    self.pending = Some(Pending {
                        resume_at,
                        element: Some(element),
                        gate: None,
                    });
                    return (Token::Incomplete, 0);
                }
                Ok(_) if consumed == 0 => {
                    self.pending = Some(Pending {
                        resume_at,
                        element: Some(element),
                        gate: None,
                    });
                    return (Token::Incomplete, 0);
                }
                Ok(Event::Start(_)) => element.depth += 1,
                Ok(Event::End(tag)) => {
                    if element.depth == 0 {
                        self.bytes_examined += consumed as u64;
                        if tag.name().as_ref() != element.qname.as_slice() {
                            return (Token::Malformed, 1);
                        }
                        return (element.token, resume_at + consumed);
                    }
                    element.depth -= 1;
                }
                Ok(_) => {}
            }
            self.bytes_examined += consumed as u64;
            resume_at += consumed;
        }
    }

    /// 记下 `start` 处未闭合的标记，之后只检查新到达的字节
    fn suspend(&mut self, view: &[u8], start: usize, element: Option<OpenElement>) {
        let gate = match Gate::for_markup(view, start) {
            Some(mut gate) => {
                gate.advance(view, &mut self.bytes_examined);
                Some(gate)
            }
            None => None,
        };
        self.pending = Some(Pending {
            resume_at: start,
            element,
            gate,
        });
    }

    fn classify_start(&self, name: QName<'_>, local: &Bindings, empty: bool) -> Token {
        let prefix = name.prefix().map(|p| p.into_inner());
        let namespace = self.namespace_of(prefix, local);
        let in_namespace = |ns: &str| namespace == Some(ns.as_bytes());

        match name.local_name().into_inner() {
            b"stream" if !empty && (name.as_ref() == b"stream:stream" || in_namespace(NS_STREAMS)) => {
                Token::StreamOpen
            }
            b"features" if !empty && (name.as_ref() == b"stream:features" || in_namespace(NS_STREAMS)) => {
                Token::FeaturesOpen
            }
            b"starttls" if in_namespace(NS_TLS) => Token::StartTlsRequest,
            b"proceed" if namespace.map_or(true, |ns| ns == NS_TLS.as_bytes()) => Token::ProceedResponse,
            b"failure" if namespace.map_or(true, |ns| ns == NS_TLS.as_bytes()) => Token::FailureResponse,
            _ => Token::OtherElement,
        }
    }

    fn classify_end(&self, name: QName<'_>) -> Token {
        if name.local_name().into_inner() != b"features" {
            return Token::OtherElement;
        }
        match name.prefix().map(|p| p.into_inner()) {
            None | Some(b"stream") => Token::FeaturesClose,
            Some(prefix) if self.stream.prefix(prefix) == Some(NS_STREAMS.as_bytes()) => Token::FeaturesClose,
            Some(_) => Token::OtherElement,
        }
    }

    /// 解析元素的命名空间
    ///
    /// 带前缀时先看本标签上的声明，再看流头上的声明；不带前缀时只认本标签上的
    /// 默认命名空间，流头的默认命名空间是 `jabber:client` 之类的内容命名空间。
    fn namespace_of<'s>(&'s self, prefix: Option<&[u8]>, local: &'s Bindings) -> Option<&'s [u8]> {
        match prefix {
            Some(p) => local.prefix(p).or_else(|| self.stream.prefix(p)),
            None => local.default.as_deref(),
        }
    }
}

/// `<` 之后的字节决定这段标记是否还有可能合法
enum MarkupStart {
    Plausible,
    Undecided,
    Malformed,
}

fn check_markup(rest: &[u8]) -> MarkupStart {
    if rest.first() != Some(&b'<') {
        return MarkupStart::Plausible;
    }
    match rest.get(1).copied() {
        None => MarkupStart::Undecided,
        Some(b'?') => MarkupStart::Plausible,
        Some(b'!') if rest.len() < 3 => MarkupStart::Undecided,
        Some(b'!') => MarkupStart::Plausible,
        Some(b'/') => match rest.get(2).copied() {
            None => MarkupStart::Undecided,
            Some(b) if is_name_start(b) => MarkupStart::Plausible,
            Some(_) => MarkupStart::Malformed,
        },
        Some(b) if is_name_start(b) => MarkupStart::Plausible,
        Some(_) => MarkupStart::Malformed,
    }
}

fn xml_reader(data: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(data);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    reader
}

/// 数据截断在标记中间
fn is_unclosed(error: &XmlError) -> bool {
    matches!(
        error,
        XmlError::Syntax(
            SyntaxError::UnclosedTag
                | SyntaxError::UnclosedComment
                | SyntaxError::UnclosedCData
                | SyntaxError::UnclosedDoctype
                | SyntaxError::UnclosedPIOrXmlDecl
        )
    )
}

fn is_xml_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n')
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b':' || b >= 0x80
}
