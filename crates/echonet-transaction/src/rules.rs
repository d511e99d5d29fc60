use echonet_frame::Esv;

/// Responses a peer may legally send for `request`.
pub const fn legal_responses(request: Esv) -> &'static [Esv] {
    match request {
        Esv::SetC => &[Esv::SetRes, Esv::SetCSna],
        Esv::SetI => &[Esv::SetISna],
        Esv::Get => &[Esv::GetRes, Esv::GetSna],
        Esv::SetGet => &[Esv::SetGetRes, Esv::SetGetSna],
        Esv::InfReq => &[Esv::Inf, Esv::InfSna],
        Esv::Inf => &[Esv::InfSna],
        Esv::Infc => &[Esv::InfcRes, Esv::InfSna],
        _ => &[],
    }
}

/// Whether `response` may answer `request`.
pub fn is_legal_response(request: Esv, response: Esv) -> bool {
    legal_responses(request).contains(&response)
}
