use serde::{Deserialize, Serialize};

/// 顾问角色
///
/// 声明顺序即规范处理顺序：合并时相同优先级的瓶颈按此顺序保持稳定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Persona {
    /// 系统化、授权与运营扩张
    #[serde(rename = "dan_martell")]
    DanMartell,
    /// 定位、细分市场与获客
    #[serde(rename = "sam_ovens")]
    SamOvens,
    /// 产品报价与定价
    #[serde(rename = "alex_hormozi")]
    AlexHormozi,
}

impl Persona {
    /// 规范处理顺序
    pub const ALL: [Persona; 3] = [Persona::DanMartell, Persona::SamOvens, Persona::AlexHormozi];

    pub fn as_str(&self) -> &'static str {
        match self {
            Persona::DanMartell => "dan_martell",
            Persona::SamOvens => "sam_ovens",
            Persona::AlexHormozi => "alex_hormozi",
        }
    }

    /// 该角色在证据库中的集合标识
    pub fn collection_id(&self) -> &'static str {
        self.as_str()
    }

    /// 编排图中的节点名称
    pub fn node_name(&self) -> &'static str {
        match self {
            Persona::DanMartell => "dan_analysis",
            Persona::SamOvens => "sam_analysis",
            Persona::AlexHormozi => "alex_analysis",
        }
    }
}

impl std::fmt::Display for Persona {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
